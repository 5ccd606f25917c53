//! UI Builder module for creating keyboards and formatting messages

use crate::detector::{protocol::normalize_confidence, Detection};
use crate::localization::{t_args_lang, t_lang};

use super::commands::MenuCommand;

/// Telegram rejects photo captions longer than this (counted in UTF-16 units)
pub const MAX_CAPTION_LEN: usize = 1024;

/// Reply keyboard: rows of button labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,
}

impl Keyboard {
    fn from_commands(commands: &[MenuCommand], language_code: Option<&str>) -> Self {
        Self {
            rows: commands
                .iter()
                .map(|command| vec![command.label(language_code)])
                .collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}

/// "Analyze skin" / "Information"
pub fn main_menu_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::from_commands(
        &[MenuCommand::AnalyzeSkin, MenuCommand::Information],
        language_code,
    )
}

/// "Upload photo" / "Back"
pub fn upload_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::from_commands(&[MenuCommand::UploadPhoto, MenuCommand::Back], language_code)
}

pub fn welcome_message(language_code: Option<&str>) -> String {
    [
        format!("👋 {}", t_lang("welcome-title", language_code)),
        t_lang("welcome-description", language_code),
        t_lang("welcome-disclaimer", language_code),
        t_lang("welcome-choose", language_code),
    ]
    .join("\n\n")
}

pub fn information_message(language_code: Option<&str>) -> String {
    [
        t_lang("info-title", language_code),
        t_lang("info-description", language_code),
        t_lang("info-disclaimer", language_code),
        t_lang("info-usage", language_code),
    ]
    .join("\n\n")
}

/// Render a confidence as a percentage with one decimal, e.g. `82.3%`
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", normalize_confidence(confidence) * 100.0)
}

/// One caption line: `label (82.3%)`
pub fn format_detection_line(detection: &Detection) -> String {
    format!(
        "{} ({})",
        detection.label,
        format_confidence(detection.confidence)
    )
}

fn caption_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Build the caption sent with the annotated photo
///
/// One line per detection in detector order, or the "nothing found" line,
/// followed by the disclaimer. Trailing detection lines are replaced with an
/// "…and N more" line when the caption would exceed [`MAX_CAPTION_LEN`].
pub fn format_caption(detections: &[Detection], language_code: Option<&str>) -> String {
    let disclaimer = t_lang("result-disclaimer", language_code);

    if detections.is_empty() {
        return format!("{}\n\n{}", t_lang("nothing-found", language_code), disclaimer);
    }

    let more_line = |count: usize| {
        let count = count.to_string();
        t_args_lang("caption-more", &[("count", count.as_str())], language_code)
    };

    let lines: Vec<String> = detections.iter().map(format_detection_line).collect();
    let full_len: usize = lines.iter().map(|l| caption_len(l) + 1).sum::<usize>()
        + 1
        + caption_len(&disclaimer);

    let mut body = if full_len <= MAX_CAPTION_LEN {
        lines.join("\n")
    } else {
        let reserve = caption_len(&more_line(detections.len())) + 2 + caption_len(&disclaimer) + 1;
        let mut used = 0;
        let mut kept = Vec::new();
        for line in &lines {
            let cost = caption_len(line) + 1;
            if used + cost + reserve > MAX_CAPTION_LEN {
                break;
            }
            used += cost;
            kept.push(line.as_str());
        }

        let mut body = kept.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&more_line(lines.len() - kept.len()));
        body
    };

    body.push_str("\n\n");
    body.push_str(&disclaimer);
    body
}
