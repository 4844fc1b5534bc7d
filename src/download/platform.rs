//! 链接与平台匹配校验。
//!
//! 纯字符串检查，不访问网络。

use regex::Regex;
use std::sync::OnceLock;

use super::models::Platform;

static RE_HOST: OnceLock<Regex> = OnceLock::new();

/// 链接中的主机名部分；允许省略协议（如 `www.tiktok.com/@x`）。
fn re_host() -> &'static Regex {
    RE_HOST.get_or_init(|| {
        Regex::new(r"(?i)(?:^|\s)(?:https?://)?(?:[^\s/?#@]+@)?([a-z0-9.-]+\.[a-z]{2,})(?::\d+)?(?:[/?#]|\s|$)")
            .expect("compile RE_HOST")
    })
}

fn host_domains(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Facebook => &["facebook.com", "fb.watch", "fb.com"],
        Platform::Instagram => &["instagram.com", "instagr.am"],
        Platform::TikTok => &["tiktok.com"],
        Platform::YouTube => &["youtube.com", "youtu.be"],
    }
}

/// 取出文本中第一个链接的主机名（小写）。
pub(crate) fn extract_host(text: &str) -> Option<String> {
    let lower = text.trim().to_ascii_lowercase();
    // 分享文案里可能有带点的普通单词，优先从显式协议处开始找。
    let from = [lower.find("https://"), lower.find("http://")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(0);
    re_host()
        .captures(&lower[from..])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

/// 主机名等于某个平台域名，或是其子域名时才算匹配；路径与查询串不参与判断。
pub fn matches_platform(url: &str, platform: Platform) -> bool {
    let Some(host) = extract_host(url) else {
        return false;
    };
    host_domains(platform).iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(*domain)
                .is_some_and(|rest| rest.ends_with('.'))
    })
}

/// 粘贴链接后用于预选平台。
pub fn detect_platform(url: &str) -> Option<Platform> {
    Platform::ALL
        .into_iter()
        .find(|p| matches_platform(url, *p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiktok_link_matches_only_tiktok() {
        let url = "https://www.tiktok.com/@x/video/123";
        assert!(matches_platform(url, Platform::TikTok));
        assert!(!matches_platform(url, Platform::Facebook));
        assert!(!matches_platform(url, Platform::Instagram));
    }

    #[test]
    fn case_insensitive() {
        assert!(matches_platform("HTTPS://WWW.FACEBOOK.COM/watch?v=1", Platform::Facebook));
        assert!(matches_platform("https://Instagr.am/p/abc", Platform::Instagram));
    }

    #[test]
    fn short_hosts() {
        assert!(matches_platform("https://fb.watch/abc/", Platform::Facebook));
        assert!(matches_platform("https://vm.tiktok.com/ZM123/", Platform::TikTok));
        assert!(matches_platform("https://youtu.be/dQw4w9WgXcQ", Platform::YouTube));
    }

    #[test]
    fn share_text_around_link() {
        let text = "look at this https://www.instagram.com/reel/xyz/ lol";
        assert!(matches_platform(text, Platform::Instagram));
        let text = "wow.so good https://vm.tiktok.com/ZM1/";
        assert!(matches_platform(text, Platform::TikTok));
    }

    #[test]
    fn empty_never_matches() {
        for p in Platform::ALL {
            assert!(!matches_platform("", p));
            assert!(!matches_platform("   ", p));
        }
    }

    #[test]
    fn detects_platform() {
        assert_eq!(
            detect_platform("https://m.facebook.com/story.php?id=1"),
            Some(Platform::Facebook)
        );
        assert_eq!(detect_platform("https://example.com/video"), None);
    }

    #[test]
    fn other_domains_in_path_or_query_do_not_count() {
        let url = "https://evil.example.net/watch?next=facebook.com";
        assert!(!matches_platform(url, Platform::Facebook));
        assert_eq!(detect_platform(url), None);

        let url = "https://www.tiktok.com/@fb.watch/video/1";
        assert!(!matches_platform(url, Platform::Facebook));
        assert!(matches_platform(url, Platform::TikTok));
    }

    #[test]
    fn lookalike_hosts_are_rejected() {
        assert!(!matches_platform("https://notfacebook.com/x", Platform::Facebook));
        assert!(!matches_platform("https://facebook.com.evil.io/x", Platform::Facebook));
        assert!(!matches_platform("https://youtube.com@evil.io/x", Platform::YouTube));
    }

    #[test]
    fn host_extraction() {
        assert_eq!(
            extract_host("see https://User@WWW.YouTube.com:443/playlist?list=1").as_deref(),
            Some("www.youtube.com")
        );
        assert_eq!(extract_host("vm.tiktok.com/ZM1/").as_deref(), Some("vm.tiktok.com"));
        assert_eq!(extract_host("not a link"), None);
    }
}
