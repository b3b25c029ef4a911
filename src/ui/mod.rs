/// UI module
///
/// One submodule per route. Screens own their state and expose
/// `update`/`view` pairs; the application in `main.rs` routes between them.

pub mod browse;
pub mod encrypt;
pub mod landing;

use iced::widget::text;
use iced::{Color, Element};

/// Status line shown under a screen's controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    pub fn view<'a, M: 'a>(notice: Option<&'a Notice>) -> Element<'a, M> {
        let Some(notice) = notice else {
            return text("").size(14).into();
        };

        let color = if notice.is_error {
            Color::from_rgb(0.9, 0.4, 0.4)
        } else {
            Color::from_rgb(0.6, 0.8, 0.6)
        };
        text(notice.text.as_str()).size(14).color(color).into()
    }
}
