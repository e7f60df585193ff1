use flow_message::{Choices, Media, MediaType};

/// Flattens a response into the single string a USSD screen shows: an
/// optional media line, the message, then the choices numbered from 1.
pub fn render(message: &str, choices: Option<&Choices>, media: Option<&Media>) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    if let Some(media) = media {
        parts.push(media_line(media));
    }
    if !message.is_empty() {
        parts.push(message.to_string());
    }
    if let Some(choices) = choices.filter(|c| !c.is_empty()) {
        let lines: Vec<String> = choices
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("{}. {}", i + 1, choice.label))
            .collect();
        parts.push(lines.join("\n"));
    }

    parts.join("\n\n")
}

fn media_line(media: &Media) -> String {
    let (icon, name) = match media.kind {
        MediaType::Image => ("📷", "Image"),
        MediaType::Document => ("📄", "Document"),
        MediaType::Audio => ("🎵", "Audio"),
        MediaType::Video => ("🎥", "Video"),
        MediaType::Sticker => ("😊", "Sticker"),
    };
    format!("{icon} {name}: {}", media.url)
}
