pub mod diagnosis;
pub mod events;
pub mod history;
pub mod i18n;
pub mod store;
