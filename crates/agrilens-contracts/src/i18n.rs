use indexmap::IndexMap;
use serde_json::Value;

use crate::store::StateStore;

pub const LANGUAGE_KEY: &str = "language";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Tw,
    Ee,
}

impl Language {
    pub fn all() -> [Language; 3] {
        [Language::En, Language::Tw, Language::Ee]
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tw => "tw",
            Language::Ee => "ee",
        }
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Tw => "Twi",
            Language::Ee => "Ewe",
        }
    }

    pub fn parse(raw: &str) -> Option<Language> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "tw" => Some(Language::Tw),
            "ee" => Some(Language::Ee),
            _ => None,
        }
    }
}

pub fn load_language(store: &mut StateStore) -> Language {
    store
        .get(LANGUAGE_KEY)
        .and_then(|value| value.as_str().and_then(Language::parse))
        .unwrap_or_default()
}

pub fn save_language(store: &mut StateStore, language: Language) -> anyhow::Result<()> {
    store.set(LANGUAGE_KEY, Value::String(language.code().to_string()))
}

/// Key-based string lookup with an English fallback, so a key missing from a
/// partial catalog never renders blank.
#[derive(Debug, Clone)]
pub struct Translator {
    language: Language,
    table: IndexMap<&'static str, &'static str>,
    english: IndexMap<&'static str, &'static str>,
}

impl Translator {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            table: catalog(language),
            english: catalog(Language::En),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn tr(&self, key: &'static str) -> &'static str {
        self.table
            .get(key)
            .or_else(|| self.english.get(key))
            .copied()
            .unwrap_or(key)
    }

    /// The ten status lines cycled while an analysis is in flight.
    pub fn scanning_messages(&self) -> Vec<&'static str> {
        SCANNING_KEYS.into_iter().map(|key| self.tr(key)).collect()
    }
}

const SCANNING_KEYS: [&str; 10] = [
    "scanning.msg1",
    "scanning.msg2",
    "scanning.msg3",
    "scanning.msg4",
    "scanning.msg5",
    "scanning.msg6",
    "scanning.msg7",
    "scanning.msg8",
    "scanning.msg9",
    "scanning.msg10",
];

fn catalog(language: Language) -> IndexMap<&'static str, &'static str> {
    entries(language).iter().copied().collect()
}

fn entries(language: Language) -> &'static [(&'static str, &'static str)] {
    match language {
        Language::En => ENGLISH,
        Language::Tw => TWI,
        Language::Ee => EWE,
    }
}

const ENGLISH: &[(&str, &str)] = &[
    ("hero.badge", "AI-Powered Agricultural Assistant"),
    ("hero.title1", "Your Crops & Livestock,"),
    ("hero.title2", "Diagnosed in Seconds"),
    (
        "hero.subtitle",
        "Snap a photo of any plant disease, pest damage, or sick animal. AgriLens delivers instant diagnoses, treatment plans, and prevention tips — right from your phone.",
    ),
    ("hero.cta", "Start Scanning"),
    ("hero.history", "View Past Diagnoses"),
    ("features.heading", "Everything Your Farm Needs"),
    (
        "features.subheading",
        "Smart tools designed for modern farmers in Africa and beyond.",
    ),
    ("feature.snap.title", "Snap & Diagnose"),
    (
        "feature.snap.desc",
        "Take a photo or upload an image of your crop or livestock for instant AI analysis.",
    ),
    ("feature.disease.title", "Disease Detection"),
    (
        "feature.disease.desc",
        "Identify diseases, pests, and nutrient deficiencies with confidence scores.",
    ),
    ("feature.treatment.title", "Instant Treatment"),
    (
        "feature.treatment.desc",
        "Get affordable, practical treatment plans tailored for small-scale farmers.",
    ),
    ("feature.pest.title", "Pest Alerts"),
    (
        "feature.pest.desc",
        "Stay ahead with seasonal disease warnings and outbreak notifications.",
    ),
    ("feature.weather.title", "Weather Insights"),
    (
        "feature.weather.desc",
        "See how current weather conditions affect disease risk for your farm.",
    ),
    ("feature.severity.title", "Severity Tracking"),
    (
        "feature.severity.desc",
        "Color-coded severity levels with progress tracking over time.",
    ),
    ("cta.heading", "Ready to Protect Your Farm?"),
    (
        "cta.subtext",
        "Join thousands of farmers using AI to detect diseases early, reduce losses, and grow healthier crops.",
    ),
    ("cta.button", "Scan Your First Image"),
    ("scan.title", "Scan Your Crop or Animal"),
    (
        "scan.subtitle",
        "Upload a photo or use your camera to get an instant AI diagnosis.",
    ),
    ("scan.preview_title", "Preview"),
    ("scan.preview_subtitle", "Review your image before analyzing."),
    ("scan.retake", "Retake"),
    ("scan.analyze", "Analyze Now"),
    ("scan.scan_another", "Scan Another Image"),
    ("scan.invalid_file", "Invalid file"),
    ("scan.invalid_file_desc", "Please upload an image file."),
    ("scan.analysis_failed", "Analysis Failed"),
    (
        "scan.analysis_failed_desc",
        "Something went wrong. Please try again.",
    ),
    ("diagnosis.what_means", "What This Means for You"),
    ("diagnosis.professional", "Professional Help Recommended"),
    ("diagnosis.symptoms", "Visible Symptoms"),
    ("diagnosis.causes", "Possible Causes"),
    ("diagnosis.treatment", "Treatment Recommendations"),
    ("diagnosis.prevention", "Prevention Tips"),
    ("diagnosis.confidence.low", "Low Confidence"),
    ("diagnosis.confidence.moderate", "Moderate Confidence"),
    ("diagnosis.confidence.high", "High Confidence"),
    ("diagnosis.severity.mild", "Mild"),
    ("diagnosis.severity.moderate", "Moderate"),
    ("diagnosis.severity.severe", "Severe"),
    ("diagnosis.severity.critical", "Critical"),
    ("history.title", "Diagnosis History"),
    ("history.count", "past analyses"),
    ("history.clear", "Clear"),
    ("history.search", "Search by disease or species…"),
    ("history.empty_title", "No Diagnoses Yet"),
    ("history.empty_desc", "Your scan history will appear here."),
    ("history.back", "← Back to History"),
    ("scanning.msg1", "Analyzing image composition…"),
    ("scanning.msg2", "Identifying subject type…"),
    ("scanning.msg3", "Examining leaf texture…"),
    ("scanning.msg4", "Checking for fungal patterns…"),
    ("scanning.msg5", "Detecting color abnormalities…"),
    ("scanning.msg6", "Scanning for pest damage…"),
    ("scanning.msg7", "Evaluating symptom severity…"),
    ("scanning.msg8", "Consulting agricultural database…"),
    ("scanning.msg9", "Generating treatment plan…"),
    ("scanning.msg10", "Preparing your diagnosis…"),
    ("scanning.complete", "complete"),
];

const TWI: &[(&str, &str)] = &[
    ("hero.badge", "AI Afuom Boafo"),
    ("hero.title1", "Wo Nnɔbae ne Mmoa,"),
    ("hero.title2", "Yɛbɛhwehwɛ Ntɛm"),
    (
        "hero.subtitle",
        "Fa wo fɔn so foto nnɔbae yare, mmoa anaa mmoawa. AgriLens de ayaresahwɛ, ano aduro, ne boasetɔ nyansahyɛ brɛ wo ntɛm.",
    ),
    ("hero.cta", "Hyɛ Aseɛ Hwehwɛ"),
    ("hero.history", "Hwɛ Nea Atwam Ayaresahwɛ"),
    ("features.heading", "Nea Wo Afuom Hia Nyinaa"),
    (
        "features.subheading",
        "Adwinnade a wɔayɛ ama nnɛ mua afuomfuɔ wɔ Africa ne wiase nyinaa.",
    ),
    ("feature.snap.title", "Foto na Hwehwɛ"),
    (
        "feature.snap.desc",
        "Fa foto anaa upload mfonini a wode bɛma AI ahwehwɛ ntɛm.",
    ),
    ("feature.disease.title", "Yare Nhwehwɛmu"),
    (
        "feature.disease.desc",
        "Hu nyarewa, mmoawa, ne aduan a ɛhia ne gyidie nkontaabu.",
    ),
    ("feature.treatment.title", "Ntɛm Ayaresa"),
    (
        "feature.treatment.desc",
        "Nya ayaresa nhyehyɛe a ɛfata afuomfuɔ nketewa.",
    ),
    ("feature.pest.title", "Mmoawa Kɔkɔbɔ"),
    (
        "feature.pest.desc",
        "Di kan wɔ bere nyarewa kɔkɔbɔ ne mmɔborɔ nsɛm ho.",
    ),
    ("feature.weather.title", "Ewiem Nsɛm"),
    (
        "feature.weather.desc",
        "Hwɛ sɛnea ewiem tebea yi bɛtumi de yare aba wo afuom.",
    ),
    ("feature.severity.title", "Yare Kɛseyɛ"),
    (
        "feature.severity.desc",
        "Ahoɔden nhyehyɛe a wɔde ahoɔ akyerɛ ne nkɔsoɔ hwɛ.",
    ),
    ("cta.heading", "Woasiesie Wo Ho Abɔ Wo Afuom Ho Ban?"),
    (
        "cta.subtext",
        "Ka afuomfuɔ mpempem ho a wɔde AI hwehwɛ nyarewa ntɛm, tew ahwere so, na ɛma nnɔbae nyin yie.",
    ),
    ("cta.button", "Hwehwɛ Wo Mfonini a Edi Kan"),
    ("scan.title", "Hwehwɛ Wo Nnɔbae Anaa Wo Mmoa"),
    (
        "scan.subtitle",
        "Upload foto anaa fa wo kamera so na nya AI ayaresahwɛ ntɛm.",
    ),
    ("scan.preview_title", "Hwɛ Kan"),
    ("scan.preview_subtitle", "Hwɛ wo mfonini ansa na woahwehwɛ."),
    ("scan.retake", "San Fa Bio"),
    ("scan.analyze", "Hwehwɛ Seesei"),
    ("scan.scan_another", "Hwehwɛ Mfonini Foforɔ"),
    ("scan.invalid_file", "Fael no nyɛ"),
    ("scan.invalid_file_desc", "Yɛsrɛ upload mfonini fael."),
    ("scan.analysis_failed", "Nhwehwɛmu no Anni Yie"),
    (
        "scan.analysis_failed_desc",
        "Biribi kɔɔ basaa. Yɛsrɛ bɔ mmɔden bio.",
    ),
    ("diagnosis.what_means", "Nea Eyi Kyerɛ Wo"),
    ("diagnosis.professional", "Ɔdɔkotani Mmoa Hia"),
    ("diagnosis.symptoms", "Nsɛnkyerɛnne a Wɔhu"),
    ("diagnosis.causes", "Nneɛma a Ebetumi Adi Nkyerɛ"),
    ("diagnosis.treatment", "Ayaresa Nhyehyɛe"),
    ("diagnosis.prevention", "Boasetɔ Nyansahyɛ"),
    ("diagnosis.confidence.low", "Gyidie Kakra"),
    ("diagnosis.confidence.moderate", "Gyidie Pɔtee"),
    ("diagnosis.confidence.high", "Gyidie Kɛse"),
    ("diagnosis.severity.mild", "Ketewa"),
    ("diagnosis.severity.moderate", "Pɔtee"),
    ("diagnosis.severity.severe", "Kɛse"),
    ("diagnosis.severity.critical", "Ahokeka"),
    ("history.title", "Ayaresahwɛ Abakɔsɛm"),
    ("history.count", "nhwehwɛmu a atwam"),
    ("history.clear", "Pepa"),
    ("history.search", "Hwehwɛ yare anaa aboa din…"),
    ("history.empty_title", "Nhwehwɛmu Biara Nni Hɔ"),
    ("history.empty_desc", "Wo nhwehwɛmu abakɔsɛm bɛba ha."),
    ("history.back", "← San Kɔ Abakɔsɛm"),
    ("scanning.msg1", "Yɛrehwehwɛ mfonini no…"),
    ("scanning.msg2", "Yɛrehu nea ɛwɔ mfonini no mu…"),
    ("scanning.msg3", "Yɛrehwɛ nhaban ho…"),
    ("scanning.msg4", "Yɛrehwehwɛ fungi nsɛnkyerɛnne…"),
    ("scanning.msg5", "Yɛrehu ahoɔ a ɛnsɛ…"),
    ("scanning.msg6", "Yɛrehwehwɛ mmoawa ɔsɛe…"),
    ("scanning.msg7", "Yɛresusuw yare ahoɔden…"),
    ("scanning.msg8", "Yɛrebisa afuom database…"),
    ("scanning.msg9", "Yɛreyɛ ayaresa nhyehyɛe…"),
    ("scanning.msg10", "Yɛresiesie wo ayaresahwɛ…"),
    ("scanning.complete", "awie"),
];

const EWE: &[(&str, &str)] = &[
    ("hero.badge", "AI Agbleme Kpekpeɖenula"),
    ("hero.title1", "Wò Nukunyanu kple Lãwo,"),
    ("hero.title2", "Woakpɔe Ɖe Go Me Kaba"),
    (
        "hero.subtitle",
        "Tsɔ wò fɔn dze foto nukunyanu dɔlele, lãwo alo kakawo. AgriLens ana dɔyɔyɔ, atikegbale, kple dzɔdzɔme nyatakaka — tso wò fɔn me.",
    ),
    ("hero.cta", "Dze Egɔme Kpɔ"),
    ("hero.history", "Kpɔ Dɔlele Si Wòkpɔ Xoxo"),
    ("features.heading", "Nu Siwo Katã Wò Agble Hia"),
    (
        "features.subheading",
        "Dɔwɔnu siwo woɖo ɖi na egbe agbledela siwo le Africa kple xexeame blibo.",
    ),
    ("feature.snap.title", "Tsɔ Foto Eye Wòakpɔe"),
    (
        "feature.snap.desc",
        "Tsɔ foto alo upload nukunyanu alo lã ƒe nɔnɔme na AI akpɔe.",
    ),
    ("feature.disease.title", "Dɔlele Didi"),
    (
        "feature.disease.desc",
        "Kpɔ dɔlelewo, kakawo, kple nuɖuɖu ƒe dɔmeɖeɖe kple dzɔdzɔme xexlẽme.",
    ),
    ("feature.treatment.title", "Atikegbale Kaba"),
    (
        "feature.treatment.desc",
        "Xɔ atikegbale dodowo siwo wòateŋu axɔe be wòatsɔ akpe na agbledela suewo.",
    ),
    ("feature.pest.title", "Kaka Nunyaɖeɖe"),
    (
        "feature.pest.desc",
        "Nànya be dɔlele kple kaka aɖewo le abadze ge kple ɣeyiɣi ƒe nunyaɖeɖe.",
    ),
    ("feature.weather.title", "Yame Nyatakaka"),
    (
        "feature.weather.desc",
        "Kpɔ alesi yame nɔnɔme ateŋu adze dɔlele ƒe xaxa ɖe wò agble dzi.",
    ),
    ("feature.severity.title", "Dɔlele Ƒe Sesẽ"),
    (
        "feature.severity.desc",
        "Kɔda siwo xɔ ahoɔ vovovowo kple nɔnɔmetata akɔntabubu.",
    ),
    ("cta.heading", "Nèsɔ Gbɔgblɔ Be Nàdzra Wò Agble Ɖa?"),
    (
        "cta.subtext",
        "Ka ɖokuiwò ɖe agbledela akpe mɔkpɔkpɔ si zãa AI ɖe dɔlele didi kaba me, ɖea ahatsyoe dzi, eye wotsɔa nukunyanu nyuiewo.",
    ),
    ("cta.button", "Kpɔ Wò Foto Gbãtɔ"),
    ("scan.title", "Kpɔ Wò Nukunyanu Alo Wò Lã"),
    (
        "scan.subtitle",
        "Upload foto alo zã wò kamera be nàxɔ AI dɔyɔyɔ kaba.",
    ),
    ("scan.preview_title", "Kpɔ Gbã"),
    ("scan.preview_subtitle", "Kpɔ wò nɔnɔme hafi wòadze egɔme."),
    ("scan.retake", "Gagbugbɔ Tsɔe"),
    ("scan.analyze", "Kpɔe Fifia"),
    ("scan.scan_another", "Kpɔ Nɔnɔme Bubu"),
    ("scan.invalid_file", "Faɛl mava o"),
    ("scan.invalid_file_desc", "Taflatse upload nɔnɔme faɛl."),
    ("scan.analysis_failed", "Didime Meɖi O"),
    ("scan.analysis_failed_desc", "Nane gble. Taflatse gatrɔ awɔe."),
    ("diagnosis.what_means", "Nu Si Esia Fia Nàwò"),
    ("diagnosis.professional", "Ele Be Nàkpɔ Dɔkita"),
    ("diagnosis.symptoms", "Dzesi Siwo Wokpɔ"),
    ("diagnosis.causes", "Nu Siwo Ateŋu Ava Eme"),
    ("diagnosis.treatment", "Atikegbale Dodowo"),
    ("diagnosis.prevention", "Dzɔdzɔme Nyatakaka"),
    ("diagnosis.confidence.low", "Dziɖeɖe Sue"),
    ("diagnosis.confidence.moderate", "Dziɖeɖe Titina"),
    ("diagnosis.confidence.high", "Dziɖeɖe Gã"),
    ("diagnosis.severity.mild", "Sue"),
    ("diagnosis.severity.moderate", "Titina"),
    ("diagnosis.severity.severe", "Gã"),
    ("diagnosis.severity.critical", "Vɔ Ŋutɔ"),
    ("history.title", "Dɔyɔyɔ Nutinya"),
    ("history.count", "didi siwo wòwɔ xoxo"),
    ("history.clear", "Tutu"),
    ("history.search", "Di dɔlele alo lã…"),
    ("history.empty_title", "Didi Aɖeke Meli O"),
    ("history.empty_desc", "Wò didi nutinya ava afisia."),
    ("history.back", "← Trɔ Yi Nutinya"),
    ("scanning.msg1", "Miele nɔnɔme dim…"),
    ("scanning.msg2", "Miele nu sia ƒe ɖoɖo dim…"),
    ("scanning.msg3", "Miele ama ƒe aɖaŋu kpɔm…"),
    ("scanning.msg4", "Miele fungi dzesiwo dim…"),
    ("scanning.msg5", "Miele kɔda gbegblẽwo dim…"),
    ("scanning.msg6", "Miele kaka ƒe ɖeɖe kpɔm…"),
    ("scanning.msg7", "Miele dɔlele ƒe sesẽ susɔm…"),
    ("scanning.msg8", "Miele agbleme database biam…"),
    ("scanning.msg9", "Miele atikegbale ƒe dɔ wɔm…"),
    ("scanning.msg10", "Miele wò dɔyɔyɔ sɔm…"),
    ("scanning.complete", "ewɔ vɔ"),
];

#[cfg(test)]
mod tests {
    use crate::store::StateStore;

    use super::{load_language, save_language, Language, Translator, EWE, TWI};

    #[test]
    fn lookup_uses_the_selected_language() {
        let translator = Translator::new(Language::Tw);
        assert_eq!(translator.tr("history.clear"), "Pepa");
        assert_eq!(translator.tr("diagnosis.severity.mild"), "Ketewa");
    }

    #[test]
    fn missing_key_falls_back_to_english_then_the_key() {
        let translator = Translator::new(Language::Ee);
        assert_eq!(translator.tr("no.such.key"), "no.such.key");
        let english = Translator::new(Language::En);
        assert_eq!(english.tr("scan.invalid_file"), "Invalid file");
    }

    #[test]
    fn every_language_covers_the_english_key_set() {
        for table in [TWI, EWE] {
            for (key, _) in super::ENGLISH {
                assert!(
                    table.iter().any(|(other, _)| other == key),
                    "missing key {key}"
                );
            }
        }
    }

    #[test]
    fn scanning_messages_cycle_ten_entries() {
        for language in Language::all() {
            let translator = Translator::new(language);
            let messages = translator.scanning_messages();
            assert_eq!(messages.len(), 10);
            assert!(messages.iter().all(|message| !message.is_empty()));
        }
    }

    #[test]
    fn language_codes_roundtrip() {
        for language in Language::all() {
            assert_eq!(Language::parse(language.code()), Some(language));
        }
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn selection_persists_through_the_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = StateStore::new(temp.path().join("state.json"));
        assert_eq!(load_language(&mut store), Language::En);
        save_language(&mut store, Language::Ee)?;
        assert_eq!(load_language(&mut store), Language::Ee);
        Ok(())
    }
}
