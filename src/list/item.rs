use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Random base36 characters appended to every generated id.
const ID_SUFFIX_LEN: usize = 6;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One tracked show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub seasons: String,
    #[serde(default)]
    pub episodes: String,
    #[serde(default)]
    pub watched: bool,
}

/// Body of an add request. Everything but the title is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub seasons: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub episodes: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub watched: Option<bool>,
}

impl NewItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves the stored field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub seasons: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub episodes: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub watched: Option<bool>,
}

impl ItemPatch {
    /// Overwrite the fields present in the patch. The id is never touched.
    pub fn apply(self, item: &mut Item) {
        if let Some(title) = self.title {
            item.title = title;
        }
        if let Some(seasons) = self.seasons {
            item.seasons = seasons;
        }
        if let Some(episodes) = self.episodes {
            item.episodes = episodes;
        }
        if let Some(watched) = self.watched {
            item.watched = watched;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.seasons.is_none()
            && self.episodes.is_none()
            && self.watched.is_none()
    }
}

/// New item id: base36 millisecond timestamp followed by a random base36 suffix.
pub fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let mut rng = rand::thread_rng();
    let mut id = to_base36(millis);
    id.extend((0..ID_SUFFIX_LEN).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char));
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Text field that also accepts numbers (`"seasons": 3`). `null` counts as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Flag that follows JSON truthiness: `1`, `"yes"`, `{}` are true; `0`, `""` are false.
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(Value::String(s)) => Some(!s.is_empty()),
        Some(Value::Array(_) | Value::Object(_)) => Some(true),
    })
}
