use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Maps a lowercased phrase of one to three words onto a canonical
/// technology name.
pub trait TechnologyVocabulary: Send + Sync {
    fn canonical(&self, phrase: &str) -> Option<&str>;
}

impl TechnologyVocabulary for HashMap<String, String> {
    fn canonical(&self, phrase: &str) -> Option<&str> {
        self.get(phrase).map(String::as_str)
    }
}

static BUILTIN: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("react.js", "React"),
        ("reactjs", "React"),
        ("react", "React"),
        ("node.js", "Node"),
        ("nodejs", "Node"),
        ("node", "Node"),
        ("vue.js", "Vue"),
        ("vuejs", "Vue"),
        ("vue", "Vue"),
        ("express.js", "Express"),
        ("expressjs", "Express"),
        ("express", "Express"),
        ("spring.js", "Spring"),
        ("springjs", "Spring"),
        ("spring", "Spring"),
        ("angular.js", "Angular"),
        ("angularjs", "Angular"),
        ("angular", "Angular"),
        ("redux.js", "Redux"),
        ("reduxjs", "Redux"),
        ("redux", "Redux"),
        ("asp.net", "ASP.NET"),
        ("django", "Django"),
        ("flask", "Flask"),
        ("laravel", "Laravel"),
        ("ruby on rails", "Rails"),
        ("rails", "Rails"),
        ("jquery", "jQuery"),
        ("drupal", "Drupal"),
        (".net", ".NET"),
        (".net core", ".NET Core"),
        ("pandas", "pandas"),
        ("unity 3d", "Unity"),
        ("unity", "Unity"),
        ("react native", "React Native"),
        ("tensorflow", "TensorFlow"),
        ("ansible", "Ansible"),
        ("cordova", "Apache Cordova"),
        ("apache cordova", "Apache Cordova"),
        ("xamarin", "Xamarin"),
        ("apache spark", "Apache Spark"),
        ("hadoop", "Apache Hadoop"),
        ("apache hadoop", "Apache Hadoop"),
        ("unreal engine", "Unreal Engine"),
        ("flutter", "Flutter"),
        ("pytorch", "PyTorch"),
        ("torch", "PyTorch"),
        ("puppet", "Puppet"),
        ("chef", "Chef"),
        ("cryengine", "CryEngine"),
    ])
});

/// The fixed alias table shipped with the worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTechnologies;

impl TechnologyVocabulary for BuiltinTechnologies {
    fn canonical(&self, phrase: &str) -> Option<&str> {
        BUILTIN.get(phrase).copied()
    }
}

const LEADING_NOISE: &[char] = &['(', '[', '{', '<', '"', '\'', '`', '*', '#'];
const TRAILING_NOISE: &[char] = &[
    ',', ';', ':', '!', '?', '.', ')', ']', '}', '>', '"', '\'', '`', '*',
];

fn normalize_word(word: &str) -> String {
    word.trim_start_matches(LEADING_NOISE)
        .trim_end_matches(TRAILING_NOISE)
        .to_lowercase()
}

/// Technologies mentioned in free text.
///
/// Every 1-, 2- and 3-word window is looked up independently, so "React
/// Native" yields both `React` and `React Native`.
pub fn extract_technologies<V>(vocabulary: &V, text: &str) -> BTreeSet<String>
where
    V: TechnologyVocabulary + ?Sized,
{
    let words: Vec<String> = text
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();

    let mut found = BTreeSet::new();
    for width in 1..=3 {
        for window in words.windows(width) {
            if let Some(name) = vocabulary.canonical(&window.join(" ")) {
                found.insert(name.to_string());
            }
        }
    }
    found
}
