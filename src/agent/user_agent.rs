//! User-agent generation for browser impersonation profiles

use rand::seq::SliceRandom;

use crate::models::{Browser, BrowserOptions, Platform};

struct UserAgentEntry {
    browser: Browser,
    platform: Platform,
    value: &'static str,
}

const fn entry(browser: Browser, platform: Platform, value: &'static str) -> UserAgentEntry {
    UserAgentEntry {
        browser,
        platform,
        value,
    }
}

static USER_AGENTS: &[UserAgentEntry] = &[
    entry(
        Browser::Chrome,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.6312.122 Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Darwin,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Linux,
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Android,
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.6367.82 Mobile Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Android,
        "Mozilla/5.0 (Linux; Android 13; SM-S908B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.6312.118 Mobile Safari/537.36",
    ),
    entry(
        Browser::Chrome,
        Platform::Ios,
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/124.0.6367.88 Mobile/15E148 Safari/604.1",
    ),
    entry(
        Browser::Firefox,
        Platform::Windows,
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ),
    entry(
        Browser::Firefox,
        Platform::Darwin,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    ),
    entry(
        Browser::Firefox,
        Platform::Linux,
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ),
    entry(
        Browser::Firefox,
        Platform::Linux,
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    ),
    entry(
        Browser::Firefox,
        Platform::Android,
        "Mozilla/5.0 (Android 14; Mobile; rv:125.0) Gecko/125.0 Firefox/125.0",
    ),
    entry(
        Browser::Firefox,
        Platform::Ios,
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) FxiOS/125.0 Mobile/15E148 Safari/605.1.15",
    ),
];

/// Pick a user agent matching the profile. `custom_ua` always wins.
pub fn generate(options: &BrowserOptions) -> String {
    if let Some(custom) = &options.custom_ua {
        return custom.clone();
    }

    let candidates: Vec<&UserAgentEntry> = USER_AGENTS
        .iter()
        .filter(|e| e.browser == options.browser)
        .filter(|e| match options.platform {
            Some(platform) => e.platform == platform,
            None => true,
        })
        .filter(|e| {
            if e.platform.is_mobile() {
                options.allows_mobile()
            } else {
                options.allows_desktop()
            }
        })
        .collect();

    let mut rng = rand::thread_rng();
    match candidates.choose(&mut rng) {
        Some(chosen) => chosen.value.to_string(),
        None => fallback(options.browser).to_string(),
    }
}

/// `Accept` header a real browser of this family sends for navigations
pub fn accept_header(browser: Browser) -> &'static str {
    match browser {
        Browser::Chrome => "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        Browser::Firefox => "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    }
}

fn fallback(browser: Browser) -> &'static str {
    USER_AGENTS
        .iter()
        .find(|e| e.browser == browser)
        .map(|e| e.value)
        .unwrap_or(USER_AGENTS[0].value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_ua_wins() {
        let options = BrowserOptions {
            custom_ua: Some("MyBot/1.0".to_string()),
            ..Default::default()
        };
        assert_eq!(generate(&options), "MyBot/1.0");
    }

    #[test]
    fn test_firefox_profile_yields_firefox() {
        let options = BrowserOptions {
            browser: Browser::Firefox,
            ..Default::default()
        };
        for _ in 0..20 {
            let ua = generate(&options);
            assert!(ua.contains("Firefox") || ua.contains("FxiOS"), "{}", ua);
        }
    }

    #[test]
    fn test_desktop_only_never_yields_mobile() {
        let options = BrowserOptions {
            browser: Browser::Chrome,
            mobile: Some(false),
            ..Default::default()
        };
        for _ in 0..20 {
            assert!(!generate(&options).contains("Mobile"));
        }
    }

    #[test]
    fn test_platform_is_respected() {
        let options = BrowserOptions {
            browser: Browser::Chrome,
            platform: Some(Platform::Android),
            ..Default::default()
        };
        for _ in 0..20 {
            assert!(generate(&options).contains("Android"));
        }
    }

    #[test]
    fn test_every_profile_has_a_candidate() {
        for browser in [Browser::Chrome, Browser::Firefox] {
            for platform in [
                Platform::Linux,
                Platform::Windows,
                Platform::Darwin,
                Platform::Android,
                Platform::Ios,
            ] {
                assert!(USER_AGENTS
                    .iter()
                    .any(|e| e.browser == browser && e.platform == platform));
            }
        }
    }
}
