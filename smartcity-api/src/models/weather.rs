use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub city: String,
    /// Current temperature in Celsius
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Description with each word capitalized
    pub description: String,
    /// Icon image URL
    pub icon_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// Capitalizes the first letter of each word (`"few clouds"` -> `"Few Clouds"`).
pub fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
