//! Provider condition codes mapped to display labels.
//!
//! wttr.in reports lowercase free-text descriptions ("light rain"); the
//! Caiyun-style providers report uppercase enums ("LIGHT_RAIN"). Both code
//! families live in one table so the rest of the engine never sees
//! provider-specific strings.

/// Display label for a condition code, `None` when the code is unknown
/// (callers fall back to showing the raw code).
pub fn condition_label(code: &str) -> Option<&'static str> {
    let label = match code.to_lowercase().as_str() {
        // clear
        "sunny" | "clear" | "clear sky" | "clear_day" | "clear_night" => "晴",
        "few clouds" => "晴间多云",
        // clouds
        "partly cloudy" | "cloudy" | "mostly cloudy" | "broken clouds"
        | "partly_cloudy_day" | "partly_cloudy_night" => "多云",
        "scattered clouds" => "少云",
        "overcast" | "overcast clouds" => "阴",
        // rain
        "light rain" | "light_rain" => "小雨",
        "moderate rain" | "moderate_rain" => "中雨",
        "heavy rain" | "heavy_rain" => "大雨",
        "storm_rain" => "暴雨",
        "rain" => "雨",
        "light rain shower" | "rain shower" => "阵雨",
        "heavy rain shower" => "大阵雨",
        "patchy rain possible" | "patchy light rain" => "局部小雨",
        "patchy rain nearby" => "局部雨",
        "drizzle" | "light drizzle" => "毛毛雨",
        "patchy light drizzle" => "局部毛毛雨",
        // snow
        "light snow" | "light_snow" => "小雪",
        "moderate snow" | "moderate_snow" => "中雪",
        "heavy snow" | "heavy_snow" => "大雪",
        "storm_snow" => "暴雪",
        "snow" => "雪",
        "light snow showers" | "snow showers" => "阵雪",
        "patchy snow possible" | "patchy light snow" => "局部小雪",
        "blizzard" => "暴风雪",
        "blowing snow" => "吹雪",
        // sleet
        "sleet" => "雨夹雪",
        "light sleet" => "小雨夹雪",
        "light sleet showers" => "阵雨夹雪",
        "patchy sleet possible" => "局部雨夹雪",
        // thunder
        "thunder" => "雷暴",
        "thunderstorm" => "雷雨",
        "light thunderstorm" => "小雷雨",
        "heavy thunderstorm" => "大雷雨",
        "thundery outbreaks possible" => "可能有雷暴",
        "patchy light rain with thunder" => "局部雷阵雨",
        "moderate or heavy rain with thunder" => "中到大雷阵雨",
        // fog, haze, dust
        "mist" => "薄雾",
        "fog" => "雾",
        "freezing fog" => "冻雾",
        "haze" => "霾",
        "light_haze" => "轻度雾霾",
        "moderate_haze" => "中度雾霾",
        "heavy_haze" => "重度雾霾",
        "smoke" => "烟",
        "dust" => "浮尘",
        "sand" => "沙尘",
        "sandstorm" => "沙尘暴",
        // wind
        "wind" | "windy" => "大风",
        "strong wind" => "强风",
        "gale" => "烈风",
        "storm" => "风暴",
        "violent storm" => "狂风",
        "tornado" => "龙卷风",
        "cyclone" => "气旋",
        // freezing precipitation and hail
        "freezing rain" => "冻雨",
        "heavy freezing rain" => "大冻雨",
        "light freezing rain" => "小冻雨",
        "ice pellets" => "冰粒",
        "frost" => "霜",
        "hail" => "冰雹",
        "light hail" => "小冰雹",
        "heavy hail" => "大冰雹",
        "rain with hail" => "雨夹冰雹",
        _ => return None,
    };
    Some(label)
}

const BAD_WEATHER_TERMS: [&str; 9] = [
    "rain", "snow", "sleet", "drizzle", "thunder", "storm", "hail", "blizzard", "shower",
];

/// Whether the condition is worth a cheerful weather voice line.
/// Anything without precipitation or storm terms counts as good.
pub fn is_good_weather(code: &str) -> bool {
    let code = code.to_lowercase();
    !BAD_WEATHER_TERMS.iter().any(|term| code.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_code_families() {
        assert_eq!(condition_label("light rain"), Some("小雨"));
        assert_eq!(condition_label("LIGHT_RAIN"), Some("小雨"));
        assert_eq!(condition_label("CLEAR_DAY"), Some("晴"));
        assert_eq!(condition_label("overcast clouds"), Some("阴"));
    }

    #[test]
    fn unknown_codes_fall_through() {
        assert_eq!(condition_label("volcanic ash"), None);
    }

    #[test]
    fn precipitation_is_not_good_weather() {
        assert!(is_good_weather("sunny"));
        assert!(is_good_weather("PARTLY_CLOUDY_DAY"));
        assert!(is_good_weather("overcast"));
        assert!(!is_good_weather("light rain shower"));
        assert!(!is_good_weather("STORM_SNOW"));
        assert!(!is_good_weather("thundery outbreaks possible"));
    }
}
