//! Message viewer.
//!
//! Renders a message body into terminal lines. Images are never fetched
//! here: each one is answered with a small placeholder and announced through
//! [`ViewerEvent::ImageRequested`] so a caller can fetch it later.
mod markdown;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crossterm::event::{KeyModifiers, MouseEvent, MouseEventKind};
use image::imageops::FilterType;
use image::DynamicImage;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::context::Context;
use crate::model::Message;
use crate::settings::{Settings, MESSAGES_GROUP, PREVIEWER_FONT_STANDARD};
use crate::util::strip_control_chars;

pub use markdown::{render_markdown, to_plain_text};

const PLACEHOLDER_PNG: &[u8] = include_bytes!("../../assets/image-placeholder.png");

const DEFAULT_FONT_FAMILY: &str = "Sans Serif";
const DEFAULT_POINT_SIZE: u16 = 10;

/// Kind of resource a rendered document asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Html,
    Image,
    StyleSheet,
}

#[derive(Debug, Clone)]
pub enum Resource {
    Image(Rc<DynamicImage>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    ImageRequested(String),
}

/// Font as stored in settings: `family,point size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDescription {
    pub family: String,
    pub point_size: u16,
}

impl Default for FontDescription {
    fn default() -> Self {
        Self {
            family: DEFAULT_FONT_FAMILY.to_string(),
            point_size: DEFAULT_POINT_SIZE,
        }
    }
}

impl FromStr for FontDescription {
    type Err = std::convert::Infallible;

    /// Lenient: a missing or unreadable size falls back to the default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, size) = match s.rsplit_once(',') {
            Some((family, size)) => (family, size.trim().parse().ok()),
            None => (s, None),
        };
        let family = family.trim();
        Ok(Self {
            family: if family.is_empty() {
                DEFAULT_FONT_FAMILY.to_string()
            } else {
                family.to_string()
            },
            point_size: size.filter(|size| *size > 0).unwrap_or(DEFAULT_POINT_SIZE),
        })
    }
}

impl fmt::Display for FontDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.family, self.point_size)
    }
}

pub struct MessageViewer {
    settings: Rc<RefCell<Settings>>,
    events: UnboundedSender<ViewerEvent>,
    placeholder_width: u32,
    placeholder: Option<Rc<DynamicImage>>,
    base_url: Option<Url>,
    lines: Vec<Line<'static>>,
    scroll: u16,
    font: FontDescription,
}

impl MessageViewer {
    pub fn new(ctx: &Context) -> (Self, UnboundedReceiver<ViewerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let font: FontDescription = ctx
            .settings
            .borrow()
            .get(MESSAGES_GROUP, PREVIEWER_FONT_STANDARD)
            .map(|value| value.parse::<FontDescription>().unwrap_or_default())
            .unwrap_or_default();

        let viewer = Self {
            settings: Rc::clone(&ctx.settings),
            events,
            placeholder_width: ctx.config.image_placeholder_width.max(1),
            placeholder: None,
            base_url: None,
            lines: Vec::new(),
            scroll: 0,
            font,
        };
        (viewer, rx)
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn font(&self) -> &FontDescription {
        &self.font
    }

    /// Replaces the shown document with `message`'s body and scrolls to the top.
    pub fn set_message(&mut self, message: &Message) {
        self.base_url = message.url.as_deref().and_then(|url| Url::parse(url).ok());
        let body = strip_control_chars(&message.contents);
        let lines = render_markdown(&body, |url| self.image_span(url));
        self.lines = lines;
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.base_url = None;
        self.lines.clear();
        self.scroll = 0;
    }

    /// Answers a resource lookup made while rendering a document.
    ///
    /// Images always get the placeholder and an [`ViewerEvent::ImageRequested`]
    /// for `url`. Other kinds are not served.
    pub fn load_resource(&mut self, kind: ResourceKind, url: &str) -> Option<Resource> {
        match kind {
            ResourceKind::Image => {
                // The receiver may be gone; nothing to do then.
                let _ = self.events.send(ViewerEvent::ImageRequested(url.to_string()));
                self.placeholder().map(Resource::Image)
            }
            ResourceKind::Html | ResourceKind::StyleSheet => None,
        }
    }

    /// Handles a mouse wheel tick.
    ///
    /// Plain wheel scrolls; with Ctrl held it changes the font size. Either
    /// way the current font is saved afterwards. Returns `false` for events
    /// that are not wheel ticks.
    pub fn wheel_event(&mut self, event: MouseEvent) -> bool {
        let up = match event.kind {
            MouseEventKind::ScrollUp => true,
            MouseEventKind::ScrollDown => false,
            _ => return false,
        };

        if event.modifiers.contains(KeyModifiers::CONTROL) {
            self.font.point_size = if up {
                self.font.point_size.saturating_add(1)
            } else {
                self.font.point_size.saturating_sub(1).max(1)
            };
        } else if up {
            self.scroll = self.scroll.saturating_sub(1);
        } else {
            let last = u16::try_from(self.lines.len().saturating_sub(1)).unwrap_or(u16::MAX);
            self.scroll = self.scroll.saturating_add(1).min(last);
        }

        self.save_font();
        true
    }

    /// Widget showing the document at the current scroll offset.
    pub fn paragraph(&self) -> Paragraph<'static> {
        Paragraph::new(Text::from(self.lines.clone()))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
    }

    fn save_font(&self) {
        let value = self.font.to_string();
        if let Err(e) = self
            .settings
            .borrow_mut()
            .set(MESSAGES_GROUP, PREVIEWER_FONT_STANDARD, &value)
        {
            tracing::warn!(error = %e, font = %value, "Failed to save previewer font");
        }
    }

    fn image_span(&mut self, url: &str) -> Span<'static> {
        let url = self.resolve(url);
        match self.load_resource(ResourceKind::Image, &url) {
            Some(Resource::Image(image)) => Span::styled(
                format!("[image {}x{}]", image.width(), image.height()),
                Style::default().fg(Color::Blue),
            ),
            None => Span::styled("[image]", Style::default().fg(Color::Blue)),
        }
    }

    fn resolve(&self, url: &str) -> String {
        if let Ok(absolute) = Url::parse(url) {
            return absolute.into();
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(url).ok())
            .map_or_else(|| url.to_string(), Into::into)
    }

    /// Decoded once, then shared.
    fn placeholder(&mut self) -> Option<Rc<DynamicImage>> {
        if let Some(image) = &self.placeholder {
            return Some(Rc::clone(image));
        }

        let decoded = match image::load_from_memory(PLACEHOLDER_PNG) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(error = %e, "Cannot decode image placeholder");
                return None;
            }
        };
        let width = self.placeholder_width;
        let height = (u64::from(decoded.height()) * u64::from(width) / u64::from(decoded.width().max(1)))
            .max(1);
        let height = u32::try_from(height).unwrap_or(u32::MAX);
        let scaled = Rc::new(decoded.resize_exact(width, height, FilterType::Nearest));
        self.placeholder = Some(Rc::clone(&scaled));
        Some(scaled)
    }
}

impl fmt::Debug for MessageViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageViewer")
            .field("lines", &self.lines.len())
            .field("scroll", &self.scroll)
            .field("font", &self.font)
            .finish_non_exhaustive()
    }
}
