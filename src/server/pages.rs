//! HTML pages
//!
//! Templates are rendered once at startup with the configured video size;
//! per-request rendering only substitutes recording names, which have
//! already passed [`RecordingName::parse`](crate::store::RecordingName::parse)
//! and so contain no markup characters.

use std::fmt::Write;

use crate::store::RecordingEntry;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Pi Camera</title>
</head>
<body>
<h1>Pi Camera</h1>
<p><a href="/recordings/index.html">Recordings</a></p>
<img src="/stream.mjpg" width="{width}" height="{height}" alt="Live stream">
</body>
</html>
"#;

const PLAYBACK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name}</title>
</head>
<body>
<h1>{name}</h1>
<p><a href="/recordings/index.html">Back to recordings</a></p>
<video width="{width}" height="{height}" controls autoplay>
<source src="/recordings/{name}" type="video/mp4">
</video>
</body>
</html>
"#;

const RECORDINGS_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Recordings</title>
</head>
<body>
<h1>Recordings</h1>
<p><a href="/index.html">Live view</a></p>
{files}</body>
</html>
"#;

/// Pre-rendered page templates
#[derive(Debug, Clone)]
pub struct Pages {
    index: String,
    playback: String,
}

impl Pages {
    /// Render templates for a `width` x `height` video
    pub fn new(width: u32, height: u32) -> Self {
        let size = |t: &str| {
            t.replace("{width}", &width.to_string())
                .replace("{height}", &height.to_string())
        };

        Self {
            index: size(INDEX_TEMPLATE),
            playback: size(PLAYBACK_TEMPLATE),
        }
    }

    /// Live view page
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Player for the recording `name`
    pub fn playback(&self, name: &str) -> String {
        self.playback.replace("{name}", name)
    }

    /// Listing of `entries`, in the order given
    ///
    /// Playable recordings link to the player; pending ones are plain text.
    pub fn recordings(&self, entries: &[RecordingEntry]) -> String {
        let mut files = String::new();
        for entry in entries {
            let name = entry.name.as_str();
            if entry.is_playable() {
                let _ = writeln!(files, r#"<p><a href="/playback.html?file={0}">{0}</a></p>"#, name);
            } else {
                let _ = writeln!(files, "<p>{}</p>", name);
            }
        }
        RECORDINGS_TEMPLATE.replace("{files}", &files)
    }
}

impl Default for Pages {
    fn default() -> Self {
        Self::new(640, 480)
    }
}
