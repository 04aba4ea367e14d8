//! Visitor environment summaries derived from the user agent and screen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_name: String,
    pub browser: String,
    pub platform: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_name: "Unknown Device".into(),
            browser: "Unknown Browser".into(),
            platform: "Unknown Platform".into(),
        }
    }
}

/// Leading run of `[0-9._]` after `marker`, if any.
fn version_after<'a>(ua: &'a str, marker: &str) -> Option<&'a str> {
    let start = ua.find(marker)? + marker.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

fn labelled(name: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{name} {v}"),
        None => name.to_string(),
    }
}

fn detect_platform(ua: &str) -> String {
    if ua.contains("Windows NT 10.0") {
        "Windows 10/11".into()
    } else if ua.contains("Windows NT 6.3") {
        "Windows 8.1".into()
    } else if ua.contains("Windows NT 6.1") {
        "Windows 7".into()
    } else if ua.contains("Windows") {
        "Windows".into()
    } else if ua.contains("Mac OS X") {
        let version = version_after(ua, "Mac OS X ").map(|v| v.replace('_', "."));
        labelled("macOS", version.as_deref())
    } else if ua.contains("Linux") {
        "Linux".into()
    } else if ua.contains("Android") {
        let version = version_after(ua, "Android ").map(|v| v.trim_end_matches('_'));
        labelled("Android", version)
    } else if ua.contains("iOS") || ua.contains("iPhone OS") {
        let version = version_after(ua, "OS ").map(|v| v.replace('_', "."));
        labelled("iOS", version.as_deref())
    } else {
        "Unknown Platform".into()
    }
}

fn detect_browser(ua: &str) -> String {
    let strip = |v: &str| v.trim_end_matches('_').to_string();
    if ua.contains("Edg/") {
        labelled("Edge", version_after(ua, "Edg/").map(strip).as_deref())
    } else if ua.contains("Chrome/") {
        labelled("Chrome", version_after(ua, "Chrome/").map(strip).as_deref())
    } else if ua.contains("Firefox/") {
        labelled("Firefox", version_after(ua, "Firefox/").map(strip).as_deref())
    } else if ua.contains("Safari/") && !ua.contains("Chrome") {
        labelled("Safari", version_after(ua, "Version/").map(strip).as_deref())
    } else if ua.contains("Opera/") || ua.contains("OPR/") {
        let version = version_after(ua, "OPR/").or_else(|| version_after(ua, "Opera/"));
        labelled("Opera", version.map(strip).as_deref())
    } else {
        "Unknown Browser".into()
    }
}

fn detect_device(ua: &str) -> &'static str {
    const IPHONES: [(&str, &str); 6] = [
        ("iPhone15", "iPhone 15"),
        ("iPhone14", "iPhone 14"),
        ("iPhone13", "iPhone 13"),
        ("iPhone12", "iPhone 12"),
        ("iPhone11", "iPhone 11"),
        ("iPhoneX", "iPhone X"),
    ];

    if ua.contains("iPhone") {
        IPHONES
            .iter()
            .find(|(marker, _)| ua.contains(marker))
            .map_or("iPhone", |&(_, name)| name)
    } else if ua.contains("iPad") {
        if ua.contains("iPad13") {
            "iPad Pro"
        } else if ua.contains("iPad11") {
            "iPad Air"
        } else {
            "iPad"
        }
    } else if ua.contains("Samsung") {
        if ua.contains("SM-G") {
            "Samsung Galaxy"
        } else {
            "Samsung Device"
        }
    } else if ua.contains("Pixel") {
        "Google Pixel"
    } else if ua.contains("OnePlus") {
        "OnePlus"
    } else if ua.contains("Huawei") {
        "Huawei"
    } else if ua.contains("Xiaomi") {
        "Xiaomi"
    } else if ua.contains("Mobile") {
        "Mobile Device"
    } else if ua.contains("Windows") {
        "Windows PC"
    } else if ua.contains("Macintosh") {
        if ua.contains("MacBook") {
            "MacBook"
        } else {
            "Mac"
        }
    } else if ua.contains("Linux") {
        "Linux PC"
    } else {
        "Desktop Computer"
    }
}

impl DeviceInfo {
    pub fn from_user_agent(ua: Option<&str>) -> Self {
        match ua.filter(|ua| !ua.is_empty()) {
            None => Self::default(),
            Some(ua) => Self {
                device_name: detect_device(ua).to_string(),
                browser: detect_browser(ua),
                platform: detect_platform(ua),
            },
        }
    }
}

/// Screen geometry as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl ScreenInfo {
    /// Parse `WxH` or `WxH@ratio`.
    pub fn parse(value: &str) -> Option<Self> {
        let (dims, ratio) = match value.split_once('@') {
            Some((dims, ratio)) => (dims, ratio.trim_end_matches('x').parse().ok()?),
            None => (value, 1.0),
        };
        let (w, h) = dims.split_once('x')?;
        Some(Self {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
            pixel_ratio: ratio,
        })
    }

    pub fn class(&self) -> &'static str {
        match self.width {
            0..=768 => "Mobile",
            769..=1024 => "Tablet",
            1025..=1366 => "Laptop",
            1367..=1920 => "Desktop",
            1921..=2560 => "2K Monitor",
            2561..=3840 => "4K Monitor",
            _ => "Ultra-wide/8K",
        }
    }

    /// `1920x1080`, with an `@2x` density suffix above 1.
    pub fn resolution(&self) -> String {
        if self.pixel_ratio > 1.0 {
            format!("{}x{} @{}x", self.width, self.height, self.pixel_ratio)
        } else {
            format!("{}x{}", self.width, self.height)
        }
    }
}
