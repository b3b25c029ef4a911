use std::sync::Arc;

use clap::Parser;
use iced::widget::{button, column, container, horizontal_rule};
use iced::{window, Element, Length, Size, Subscription, Task, Theme};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod bridge;
mod config;
mod state;
mod ui;

use bridge::{ProcessEngine, SharedEngine};
use config::Settings;
use ui::browse::{self, BrowseScreen};
use ui::encrypt::{self, EncryptScreen};

/// The three screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Encrypt,
    Browse,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    Navigate(Route),
    Browse(browse::Message),
    Encrypt(encrypt::Message),
    /// Window size, from the startup query or a resize event
    WindowResized(Size),
}

/// Main application state
struct CryView {
    route: Route,
    browse: BrowseScreen,
    encrypt: EncryptScreen,
}

impl CryView {
    fn new(settings: Settings, engine: SharedEngine) -> (Self, Task<Message>) {
        let mut browse = BrowseScreen::new(
            engine.clone(),
            &settings.suffix,
            settings.row_layout(),
            settings.artifact_dir(),
            settings.decrypt_timeout(),
        );
        let encrypt = EncryptScreen::new(engine, &settings.suffix, settings.min_password_len);

        // Open straight into the browse screen when a folder was given
        let (route, open) = match &settings.folder {
            Some(folder) => (Route::Browse, browse.open(folder).map(Message::Browse)),
            None => (Route::Landing, Task::none()),
        };

        // Size the list from the real window instead of waiting for a resize
        let measure = window::get_latest()
            .and_then(window::get_size)
            .map(Message::WindowResized);

        (CryView { route, browse, encrypt }, Task::batch([open, measure]))
    }

    /// Route each message to the screen that owns it
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Navigate(route) => {
                self.route = route;
                Task::none()
            }
            Message::Browse(message) => self.browse.update(message).map(Message::Browse),
            Message::Encrypt(message) => self.encrypt.update(message).map(Message::Encrypt),
            Message::WindowResized(size) => self.browse.window_resized(size.height).map(Message::Browse),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let screen = match self.route {
            Route::Landing => return ui::landing::view(),
            Route::Encrypt => self.encrypt.view().map(Message::Encrypt),
            Route::Browse => self.browse.view().map(Message::Browse),
        };

        let back = button("← Back")
            .on_press(Message::Navigate(Route::Landing))
            .style(button::text);

        column![container(back).padding(6), horizontal_rule(1), screen]
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        window::resize_events().map(|(_id, size)| Message::WindowResized(size))
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "cryview=info".into()))
        .init();

    let settings = Settings::parse();

    let artifact_dir = settings.artifact_dir();
    if let Err(e) = std::fs::create_dir_all(&artifact_dir) {
        warn!("⚠️  Could not create artifact directory {}: {}", artifact_dir.display(), e);
    }

    let engine: SharedEngine = Arc::new(ProcessEngine::new(settings.engine.clone(), settings.engine_args.clone()));
    info!("🔐 CryView starting with engine `{}`, artifacts in {}", settings.engine, artifact_dir.display());

    iced::application("CryView", CryView::update, CryView::view)
        .subscription(CryView::subscription)
        .theme(CryView::theme)
        .centered()
        .run_with(move || CryView::new(settings, engine))
}
