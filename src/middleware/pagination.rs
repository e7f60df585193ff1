//! Splits responses that do not fit on one USSD screen.
//!
//! The first oversized response is cut into a first page and the full text
//! is parked in the session. "More"/"Back" replies are then answered from
//! that text without running the flow again. Page offsets are cached the
//! first time a page is visited so moving back and forth never re-slices.

use std::collections::BTreeMap;

use async_trait::async_trait;
use flow_message::{Response, ResponseKind};
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConfigError, PaginationConfig};
use crate::context::Context;
use crate::error::Result;
use crate::pipeline::{Middleware, Next};
use crate::render::render_ussd;

/// Session key holding the [`PaginationState`].
pub const PAGINATION_KEY: &str = "ussd.pagination";

/// Inclusive character range of one page within the full text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageOffset {
    pub start: usize,
    pub finish: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationState {
    /// 1-based page the user is looking at.
    pub page: usize,
    pub offsets: BTreeMap<usize, PageOffset>,
    /// The full, unpaginated text.
    pub prompt: String,
    /// Whether the flow expects input after the last page.
    #[serde(rename = "type")]
    pub kind: ResponseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Back,
}

/// One rendered page, navigation options included.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: usize,
    pub message: String,
    pub kind: ResponseKind,
    pub has_more: bool,
}

impl From<Page> for Response {
    fn from(page: Page) -> Self {
        match page.kind {
            ResponseKind::Prompt => Response::prompt(page.message, None, None),
            ResponseKind::Terminal => Response::terminal(page.message, None),
        }
    }
}

/// The slicing half of pagination, free of session and pipeline concerns.
#[derive(Debug, Clone)]
pub struct Paginator {
    config: PaginationConfig,
    next_label: String,
    back_label: String,
    /// Room for text when the page carries one navigation line.
    single: usize,
    /// Room for text when the page carries both navigation lines.
    dual: usize,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Result<Self, ConfigError> {
        let next_label = config.next_label();
        let back_label = config.back_label();
        let next_len = next_label.chars().count();
        let back_len = back_label.chars().count();

        let dual = config
            .page_size
            .checked_sub(3 + next_len + back_len + 1)
            .filter(|dual| *dual >= 1)
            .ok_or(ConfigError::PageSizeTooSmall {
                page_size: config.page_size,
            })?;
        let single = config.page_size - 2 - next_len.max(back_len) - 1;

        Ok(Self {
            config,
            next_label,
            back_label,
            single,
            dual,
        })
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Classifies raw input as a navigation reply.
    pub fn navigation(&self, input: &str) -> Option<Navigation> {
        let input = input.trim();
        if input == self.config.next_option {
            Some(Navigation::Next)
        } else if input == self.config.back_option {
            Some(Navigation::Back)
        } else {
            None
        }
    }

    /// Cuts the first page out of `text`, or `None` when it fits as is.
    ///
    /// The first page always asks for more input, whatever `kind` is.
    pub fn first_page(&self, text: &str, kind: ResponseKind) -> Option<(Page, PaginationState)> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.config.page_size {
            return None;
        }

        let offset = PageOffset {
            start: 0,
            finish: cut(&chars, 0, self.single - 1),
        };
        let state = PaginationState {
            page: 1,
            offsets: BTreeMap::from([(1, offset)]),
            prompt: text.to_string(),
            kind,
        };
        let page = self.render(&chars, 1, offset, true, ResponseKind::Prompt);
        Some((page, state))
    }

    /// Moves to the requested page, caching its offsets in `state`.
    ///
    /// Without `navigation` the current page is shown again. Returns `None`
    /// when the cached offsets needed to find the page are missing.
    pub fn navigate(&self, state: &mut PaginationState, navigation: Option<Navigation>) -> Option<Page> {
        let chars: Vec<char> = state.prompt.chars().collect();
        let requested = match navigation {
            Some(Navigation::Next) => state.page + 1,
            Some(Navigation::Back) => state.page.saturating_sub(1).max(1),
            None => state.page.max(1),
        };

        let (number, offset, has_more) = self.locate(&chars, state, requested)?;
        state.page = number;
        state.offsets.insert(number, offset);

        Some(self.render(&chars, number, offset, has_more, state.kind))
    }

    fn locate(&self, chars: &[char], state: &PaginationState, page: usize) -> Option<(usize, PageOffset, bool)> {
        let len = chars.len();
        if let Some(offset) = state.offsets.get(&page) {
            return Some((page, *offset, offset.finish + 1 < len));
        }

        let previous_page = page.checked_sub(1).filter(|p| *p >= 1)?;
        let previous = *state.offsets.get(&previous_page)?;
        let start = previous.finish + 1;
        if start >= len {
            debug!(page = previous_page, "no content past the last page");
            return Some((previous_page, previous, false));
        }

        if len - start <= self.last_page_room(state.kind) {
            let offset = PageOffset { start, finish: len - 1 };
            return Some((page, offset, false));
        }

        let finish = cut(chars, start, start + self.dual - 1);
        Some((page, PageOffset { start, finish }, finish + 1 < len))
    }

    /// Room for text on a final page: terminal pages carry no options,
    /// prompt pages carry the back option.
    fn last_page_room(&self, kind: ResponseKind) -> usize {
        match kind {
            ResponseKind::Terminal => self.config.page_size,
            ResponseKind::Prompt => self.config.page_size - 2 - self.back_label.chars().count(),
        }
    }

    fn render(&self, chars: &[char], number: usize, offset: PageOffset, has_more: bool, kind: ResponseKind) -> Page {
        let body: String = chars[offset.start..=offset.finish].iter().collect();

        if kind == ResponseKind::Terminal && !has_more {
            return Page {
                number,
                message: body,
                kind: ResponseKind::Terminal,
                has_more,
            };
        }

        let mut options: Vec<&str> = Vec::with_capacity(2);
        if has_more {
            options.push(&self.next_label);
        }
        if number > 1 {
            options.push(&self.back_label);
        }
        let message = if options.is_empty() {
            body
        } else {
            format!("{body}\n\n{}", options.join("\n"))
        };

        Page {
            number,
            message,
            kind: ResponseKind::Prompt,
            has_more,
        }
    }
}

/// Moves `finish` back so the page does not end in the middle of a word.
///
/// Walks back to the nearest newline or space, and keeps the raw offset
/// when the page has neither.
fn cut(chars: &[char], start: usize, finish: usize) -> usize {
    let finish = finish.min(chars.len().saturating_sub(1));
    match chars.get(finish + 1) {
        None => return finish,
        Some(c) if c.is_whitespace() => return finish,
        Some(_) => {}
    }

    let window = &chars[start + 1..=finish];
    match window.iter().rposition(|c| *c == '\n' || *c == ' ') {
        Some(i) => start + 1 + i,
        None => finish,
    }
}

/// Serves paginated USSD output and navigation between its pages.
pub struct PaginationMiddleware {
    paginator: Paginator,
    pages_served: Counter<u64>,
}

impl PaginationMiddleware {
    pub fn new(config: PaginationConfig) -> Result<Self, ConfigError> {
        let pages_served = global::meter("screenflow")
            .u64_counter("pages_served")
            .with_description("Paginated USSD pages served")
            .build();
        Ok(Self {
            paginator: Paginator::new(config)?,
            pages_served,
        })
    }
}

#[async_trait]
impl Middleware for PaginationMiddleware {
    fn name(&self) -> &'static str {
        "pagination"
    }

    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let session = ctx.session()?.clone();

        let stored = match session.get_as::<PaginationState>(PAGINATION_KEY) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "discarding unreadable pagination state");
                None
            }
        };

        if let Some(mut state) = stored {
            let input = ctx.input();
            let navigation = input.and_then(|input| self.paginator.navigation(input));
            let intercept = navigation.is_some() || (state.kind == ResponseKind::Terminal && input.is_some());

            if intercept {
                match self.paginator.navigate(&mut state, navigation) {
                    Some(page) => {
                        debug!(page = page.number, has_more = page.has_more, "serving cached page");
                        if page.kind == ResponseKind::Terminal {
                            session.delete(PAGINATION_KEY);
                        } else {
                            session.set_as(PAGINATION_KEY, &state)?;
                        }
                        self.pages_served.add(1, &[]);
                        return Ok(page.into());
                    }
                    None => warn!(page = state.page, "pagination offsets missing, running flow"),
                }
            }
            session.delete(PAGINATION_KEY);
        }

        let response = next.run(ctx).await?;

        let text = render_ussd(&response.message, response.choices.as_ref(), response.media.as_ref());
        match self.paginator.first_page(&text, response.kind) {
            Some((page, state)) => {
                debug!(length = state.prompt.chars().count(), "response paginated");
                session.set_as(PAGINATION_KEY, &state)?;
                self.pages_served.add(1, &[]);
                Ok(page.into())
            }
            None => Ok(response),
        }
    }
}
