use flow_message::{Button, ChatPayload, ListRow, ListSection, MediaType, Response};

use super::RenderError;

pub const MAX_BUTTONS: usize = 3;
pub const MAX_BUTTON_TITLE: usize = 20;
pub const MAX_ROW_TITLE: usize = 24;
pub const MAX_ROWS_PER_SECTION: usize = 10;
pub const LIST_BUTTON_TEXT: &str = "Choose";

/// Picks the richest widget the chat channel supports for `response`.
pub fn render(response: &Response) -> Result<ChatPayload, RenderError> {
    let choices = response.choices.as_ref().filter(|c| !c.is_empty());

    let Some(choices) = choices else {
        return Ok(match &response.media {
            Some(media) => ChatPayload::Media {
                media: media.clone(),
                caption: (!response.message.is_empty()).then(|| response.message.clone()),
            },
            None => ChatPayload::Text {
                body: response.message.clone(),
            },
        });
    };

    if choices.len() <= MAX_BUTTONS {
        let header = match &response.media {
            Some(media) => match media.kind {
                MediaType::Image | MediaType::Video | MediaType::Document => Some(media.clone()),
                other => return Err(RenderError::UnsupportedHeader(other)),
            },
            None => None,
        };
        let buttons = choices
            .iter()
            .map(|choice| Button {
                id: choice.key.clone(),
                title: truncate(&choice.label, MAX_BUTTON_TITLE),
            })
            .collect();
        return Ok(ChatPayload::Buttons {
            body: response.message.clone(),
            buttons,
            header,
        });
    }

    if response.media.is_some() {
        return Err(RenderError::MediaWithList { max_buttons: MAX_BUTTONS });
    }

    let rows: Vec<ListRow> = choices
        .iter()
        .map(|choice| ListRow {
            id: choice.key.clone(),
            title: truncate(&choice.label, MAX_ROW_TITLE),
            description: None,
        })
        .collect();
    let chunks = rows.chunks(MAX_ROWS_PER_SECTION);
    let numbered = chunks.len() > 1;
    let sections = chunks
        .enumerate()
        .map(|(i, rows)| ListSection {
            title: if numbered { format!("Options {}", i + 1) } else { "Options".to_string() },
            rows: rows.to_vec(),
        })
        .collect();

    Ok(ChatPayload::List {
        body: response.message.clone(),
        button_text: LIST_BUTTON_TEXT.to_string(),
        sections,
    })
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
