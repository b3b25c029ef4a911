/// Browse route: virtualized container list with on-demand preview
///
/// Only the rows in the viewport window are built as widgets; the rest of
/// the list is two spacers sized from the window's offsets. Each visible row
/// asks the thumbnail cache for its item once, and every async result comes
/// back tagged with the snapshot or selection it belongs to.
use std::path::PathBuf;
use std::time::Duration;

use iced::widget::image::Handle;
use iced::widget::{button, column, container, image, row, scrollable, text, text_input, Column, Space};
use iced::{Alignment, ContentFit, Element, Length, Task};
use tracing::{info, warn};

use super::Notice;
use crate::bridge::SharedEngine;
use crate::state::catalog::{ContainerCatalog, ScanCompletion};
use crate::state::data::{FolderSnapshot, ScanId, Thumbnail};
use crate::state::preview::{ArtifactGeneration, Completion, DecryptOutcome, PreviewController, PreviewState};
use crate::state::session::{BrowseSession, RowLayout};
use crate::state::thumbs::{ThumbState, ThumbnailArrival, ThumbnailFetch};

/// Height of everything above the list: back bar, folder and password rows
const CHROME_HEIGHT: f32 = 160.0;

/// Window height assumed until the first resize or scroll reports one
const DEFAULT_WINDOW_HEIGHT: f32 = 768.0;

#[derive(Debug, Clone)]
pub enum Message {
    FolderChanged(String),
    Open,
    Scanned(ScanCompletion),
    Scrolled(scrollable::Viewport),
    ThumbnailArrived(ThumbnailArrival),
    PasswordChanged(String),
    Select(String),
    Decrypted(DecryptOutcome),
    ArtifactLoaded(ArtifactGeneration, Result<Vec<u8>, String>),
}

/// Artifact bytes loaded into an image handle, tied to one generation
struct LoadedArtifact {
    generation: ArtifactGeneration,
    handle: Handle,
}

pub struct BrowseScreen {
    engine: SharedEngine,
    /// Scan issuer; only its newest listing is installed
    catalog: ContainerCatalog,
    layout: RowLayout,
    /// Snapshot, window and thumbnail cache of the folder on screen
    session: BrowseSession,
    preview: PreviewController,
    /// Decoded bytes of the applied artifact, if they have been read yet
    loaded: Option<LoadedArtifact>,
    folder_input: String,
    /// Password used for on-selection decrypts. Never stored elsewhere.
    password: String,
    notice: Option<Notice>,
    /// Last known height of the list viewport in pixels
    list_height: f32,
}

fn list_id() -> scrollable::Id {
    scrollable::Id::new("container-list")
}

impl BrowseScreen {
    pub fn new(engine: SharedEngine, suffix: &str, layout: RowLayout, artifact_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            engine,
            catalog: ContainerCatalog::new(suffix),
            layout,
            session: BrowseSession::new(FolderSnapshot::empty(ScanId(0), ""), layout),
            preview: PreviewController::new(artifact_dir, timeout),
            loaded: None,
            folder_input: String::new(),
            password: String::new(),
            notice: None,
            list_height: DEFAULT_WINDOW_HEIGHT - CHROME_HEIGHT,
        }
    }

    /// Scan `folder` and show it once the listing arrives
    pub fn open(&mut self, folder: &str) -> Task<Message> {
        self.folder_input = folder.to_string();
        self.update(Message::Open)
    }

    /// The window changed size; estimate the list viewport until the list
    /// reports its real bounds on the next scroll
    pub fn window_resized(&mut self, window_height: f32) -> Task<Message> {
        self.list_height = (window_height - CHROME_HEIGHT).max(0.0);
        let fetches = self.session.resized(self.list_height);
        self.fetch_thumbnails(fetches)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::FolderChanged(folder) => {
                self.folder_input = folder;
                Task::none()
            }
            Message::Open => {
                // Validate input before touching the catalog
                let folder = self.folder_input.trim().to_string();
                if folder.is_empty() {
                    self.notice = Some(Notice::error("Enter a folder to browse"));
                    return Task::none();
                }

                // Issuing a scan makes any earlier one stale
                self.notice = Some(Notice::info(format!("Scanning {}...", folder)));
                let request = self.catalog.begin_scan(folder);
                Task::perform(request.run(self.engine.clone()), Message::Scanned)
            }
            Message::Scanned(completion) => {
                let Some(outcome) = self.catalog.finish(completion) else {
                    return Task::none();
                };

                self.notice = match outcome.failure() {
                    Some(failure) => Some(Notice::error(failure.to_string())),
                    None => Some(Notice::info(format!("{} encrypted files", outcome.snapshot().len()))),
                };

                // New snapshot: new cache, new window, nothing selected
                self.session = BrowseSession::new(outcome.into_snapshot(), self.layout);
                self.preview.reset();
                self.loaded = None;

                // Fill the first screen of rows and scroll back to the top
                let fetches = self.session.resized(self.list_height);
                Task::batch([
                    scrollable::scroll_to(list_id(), scrollable::AbsoluteOffset { x: 0.0, y: 0.0 }),
                    self.fetch_thumbnails(fetches),
                ])
            }
            Message::Scrolled(viewport) => {
                // The list knows its real bounds, prefer them to the window estimate
                self.list_height = viewport.bounds().height;
                let fetches = self.session.scrolled(viewport.absolute_offset().y, viewport.bounds().height);
                self.fetch_thumbnails(fetches)
            }
            Message::ThumbnailArrived(arrival) => {
                let Some(arrived) = self.session.thumbnail_arrived(arrival) else {
                    return Task::none();
                };
                // A pending selection may be waiting on this thumbnail
                if let Some(thumbnail) = &arrived.thumbnail {
                    self.preview.thumbnail_arrived(&arrived.item_path, thumbnail);
                }
                self.fetch_thumbnails(arrived.fetches)
            }
            Message::PasswordChanged(password) => {
                self.password = password;
                Task::none()
            }
            Message::Select(path) => {
                let Some(item) = self.session.snapshot().item(&path).cloned() else {
                    return Task::none();
                };
                let thumbnail = self.session.thumbs().thumbnail(&path).cloned();

                match self.preview.select(&item, thumbnail, &self.password) {
                    Some(request) => Task::perform(request.run(self.engine.clone()), Message::Decrypted),
                    None => Task::none(),
                }
            }
            Message::Decrypted(outcome) => match self.preview.complete(outcome) {
                Completion::Applied(artifact) => {
                    let generation = artifact.generation;
                    Task::perform(load_artifact(artifact.location), move |result| {
                        Message::ArtifactLoaded(generation, result)
                    })
                }
                Completion::Discarded => Task::none(),
                Completion::Failed(failure) => {
                    self.notice = Some(Notice::error(failure.to_string()));
                    Task::none()
                }
            },
            Message::ArtifactLoaded(generation, result) => {
                // Bytes for a superseded artifact are dropped unread
                let current = self.preview.artifact().map(|artifact| artifact.generation);
                if current != Some(generation) {
                    return Task::none();
                }

                match result {
                    Ok(bytes) => {
                        self.loaded = Some(LoadedArtifact {
                            generation,
                            handle: Handle::from_bytes(bytes),
                        });
                    }
                    Err(e) => {
                        warn!("⚠️  Could not load preview: {}", e);
                        self.notice = Some(Notice::error(e));
                    }
                }
                Task::none()
            }
        }
    }

    fn fetch_thumbnails(&self, fetches: Vec<ThumbnailFetch>) -> Task<Message> {
        if fetches.is_empty() {
            return Task::none();
        }
        Task::batch(
            fetches
                .into_iter()
                .map(|fetch| Task::perform(fetch.run(self.engine.clone()), Message::ThumbnailArrived)),
        )
    }

    pub fn view(&self) -> Element<'_, Message> {
        let folder_row = row![
            text_input("Folder with encrypted files", &self.folder_input)
                .on_input(Message::FolderChanged)
                .on_submit(Message::Open)
                .padding(8),
            button("Open").on_press(Message::Open).padding(8),
        ]
        .spacing(8);

        let password_row = row![
            text_input("Password to decrypt previews (optional)", &self.password)
                .on_input(Message::PasswordChanged)
                .secure(true)
                .padding(8),
        ];

        let notice = Notice::view(self.notice.as_ref());

        let body = row![
            container(self.list()).width(Length::FillPortion(2)).height(Length::Fill),
            container(self.preview_pane())
                .width(Length::FillPortion(3))
                .height(Length::Fill)
                .center_x(Length::FillPortion(3))
                .center_y(Length::Fill),
        ]
        .spacing(12);

        column![folder_row, password_row, notice, body]
            .spacing(10)
            .padding(12)
            .into()
    }

    /// Top spacer, the visible rows, bottom spacer
    fn list(&self) -> Element<'_, Message> {
        let session = &self.session;
        let range = session.visible();
        let selected = self.preview.state().item_path();

        let mut rows = Column::new().width(Length::Fill);
        rows = rows.push(Space::with_height(session.row_offset(range.start)));

        for (index, _top) in range.iter() {
            let Some(item) = session.snapshot().get(index) else {
                continue;
            };
            let height = session.row_height(index);

            let thumb: Element<'_, Message> = match session.thumbs().state(&item.path) {
                ThumbState::Ready(thumbnail) => thumbnail_image(thumbnail, height - 10.0),
                ThumbState::Unrequested | ThumbState::Loading => container(text("…"))
                    .width(Length::Fixed(height - 10.0))
                    .center_x(Length::Fixed(height - 10.0))
                    .into(),
                ThumbState::Absent => Space::with_width(Length::Fixed(0.0)).into(),
            };

            let style = if selected == Some(item.path.as_str()) {
                button::primary
            } else {
                button::text
            };

            rows = rows.push(
                button(row![thumb, text(item.file_name())].spacing(10).align_y(Alignment::Center))
                    .on_press(Message::Select(item.path.clone()))
                    .style(style)
                    .width(Length::Fill)
                    .height(Length::Fixed(height)),
            );
        }

        let below = session.total_height() - session.row_offset(range.end);
        rows = rows.push(Space::with_height(below.max(0.0)));

        scrollable(rows)
            .id(list_id())
            .on_scroll(Message::Scrolled)
            .height(Length::Fill)
            .into()
    }

    fn preview_pane(&self) -> Element<'_, Message> {
        match self.preview.state() {
            PreviewState::Empty => text("Select an item to preview").into(),
            PreviewState::ThumbnailOnly { thumbnail, .. } => {
                let hint = if self.password.is_empty() {
                    "Enter a password to see the full image"
                } else {
                    "Thumbnail only"
                };
                column![interim(thumbnail.as_ref()), text(hint).size(14)]
                    .spacing(8)
                    .align_x(Alignment::Center)
                    .into()
            }
            PreviewState::Decrypting { thumbnail, .. } => {
                column![interim(thumbnail.as_ref()), text("Decrypting...").size(14)]
                    .spacing(8)
                    .align_x(Alignment::Center)
                    .into()
            }
            PreviewState::FullPreview { artifact, .. } => match &self.loaded {
                Some(loaded) if loaded.generation == artifact.generation => image(loaded.handle.clone())
                    .content_fit(ContentFit::Contain)
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .into(),
                _ => text("Loading preview...").into(),
            },
        }
    }
}

fn thumbnail_image<'a>(thumbnail: &Thumbnail, size: f32) -> Element<'a, Message> {
    image(thumbnail.handle().clone())
        .width(Length::Fixed(size))
        .height(Length::Fixed(size))
        .content_fit(ContentFit::Contain)
        .into()
}

/// Thumbnail, or a placeholder while none is known
fn interim<'a>(thumbnail: Option<&Thumbnail>) -> Element<'a, Message> {
    match thumbnail {
        Some(thumbnail) => image(thumbnail.handle().clone())
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .height(Length::FillPortion(4))
            .into(),
        None => text("No thumbnail").into(),
    }
}

/// Read a decrypted artifact and check it is an image before handing it
/// to the renderer
async fn load_artifact(location: PathBuf) -> Result<Vec<u8>, String> {
    let bytes = tokio::fs::read(&location)
        .await
        .map_err(|e| format!("could not read {}: {}", location.display(), e))?;

    ::image::guess_format(&bytes).map_err(|e| format!("{} is not an image: {}", location.display(), e))?;
    info!("🖼️  Loaded preview {} ({} bytes)", location.display(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fake::{png_bytes, FakeEngine};
    use crate::bridge::BridgeError;
    use crate::state::catalog::{ScanFailure, ScanOutcome};
    use crate::state::data::ContainerItem;
    use std::sync::Arc;

    fn screen() -> BrowseScreen {
        let engine: SharedEngine = Arc::new(FakeEngine::new());
        let layout = RowLayout {
            row_height: 100.0,
            compact_height: 40.0,
            overscan: 0,
        };
        BrowseScreen::new(engine, ".cry", layout, PathBuf::from("/cache"), Duration::from_secs(30))
    }

    fn listing(id: ScanId, folder: &str, names: &[&str]) -> ScanCompletion {
        let items = names
            .iter()
            .map(|name| ContainerItem::file(format!("{folder}/{name}")))
            .collect();
        ScanCompletion {
            id,
            outcome: ScanOutcome::Listed(FolderSnapshot::new(id, folder, items)),
        }
    }

    fn open(screen: &mut BrowseScreen, id: u64, folder: &str, names: &[&str]) {
        screen.folder_input = folder.to_string();
        let _ = screen.update(Message::Open);
        let _ = screen.update(Message::Scanned(listing(ScanId(id), folder, names)));
    }

    #[test]
    fn test_stale_scan_does_not_replace_newer_folder() {
        let mut s = screen();
        let _ = s.window_resized(CHROME_HEIGHT + 250.0);

        s.folder_input = "/old".into();
        let _ = s.update(Message::Open);
        s.folder_input = "/new".into();
        let _ = s.update(Message::Open);

        let _ = s.update(Message::Scanned(listing(ScanId(2), "/new", &["a.cry"])));
        let _ = s.update(Message::Scanned(listing(ScanId(1), "/old", &["x.cry", "y.cry"])));

        assert_eq!(s.session.snapshot().folder(), "/new");
        assert_eq!(s.session.snapshot().len(), 1);
    }

    #[test]
    fn test_new_folder_discards_old_thumbnails_and_selection() {
        let mut s = screen();
        let _ = s.window_resized(CHROME_HEIGHT + 250.0);
        open(&mut s, 1, "/one", &["a.cry"]);

        let old_snapshot = s.session.snapshot().id();
        s.password = "secret".into();
        let _ = s.update(Message::Select("/one/a.cry".into()));
        assert!(matches!(s.preview.state(), PreviewState::Decrypting { .. }));

        open(&mut s, 2, "/two", &["a.cry"]);
        assert_eq!(s.preview.state(), &PreviewState::Empty);

        // A late thumbnail for the first folder does not leak into the second
        let _ = s.update(Message::ThumbnailArrived(ThumbnailArrival {
            snapshot: old_snapshot,
            item_path: "/one/a.cry".into(),
            result: Ok(Some(png_bytes("old"))),
        }));
        assert!(s.session.thumbs().get("/one/a.cry").is_none());
    }

    #[test]
    fn test_late_artifact_for_old_generation_is_ignored() {
        let mut s = screen();
        let _ = s.window_resized(CHROME_HEIGHT + 250.0);
        open(&mut s, 1, "/d", &["a.cry", "b.cry"]);
        s.password = "secret".into();

        let _ = s.update(Message::Select("/d/a.cry".into()));
        let first = s.preview.current_token();
        let first_location = s.preview.selection_dir(first).join("preview");
        let _ = s.update(Message::Decrypted(DecryptOutcome {
            token: first,
            item_path: "/d/a.cry".into(),
            result: Ok(first_location),
        }));
        let first_generation = s.preview.artifact().map(|a| a.generation).unwrap();

        let _ = s.update(Message::Select("/d/b.cry".into()));
        let second = s.preview.current_token();
        let second_location = s.preview.selection_dir(second).join("preview");
        let _ = s.update(Message::Decrypted(DecryptOutcome {
            token: second,
            item_path: "/d/b.cry".into(),
            result: Ok(second_location),
        }));

        // Bytes read for the first artifact arrive after the second was applied
        let _ = s.update(Message::ArtifactLoaded(first_generation, Ok(png_bytes("a"))));
        assert!(s.loaded.is_none());

        let current = s.preview.artifact().map(|a| a.generation).unwrap();
        let _ = s.update(Message::ArtifactLoaded(current, Ok(png_bytes("b"))));
        assert_eq!(s.loaded.as_ref().map(|l| l.generation), Some(current));
    }

    #[test]
    fn test_current_decrypt_failure_sets_one_notice() {
        let mut s = screen();
        open(&mut s, 1, "/d", &["a.cry"]);
        s.password = "secret".into();

        let _ = s.update(Message::Select("/d/a.cry".into()));
        let token = s.preview.current_token();
        let failed = DecryptOutcome {
            token,
            item_path: "/d/a.cry".into(),
            result: Err(crate::state::preview::DecryptFailure::Engine("密码错误".into())),
        };

        let _ = s.update(Message::Decrypted(failed.clone()));
        assert_eq!(s.notice.as_ref().map(|n| n.text.as_str()), Some("密码错误"));

        s.notice = None;
        let _ = s.update(Message::Decrypted(failed));
        assert!(s.notice.is_none());
    }

    #[test]
    fn test_first_listing_fills_rows_before_any_resize() {
        let mut s = screen();
        open(&mut s, 1, "/d", &["a.cry", "b.cry"]);

        let range = s.session.visible();
        assert_eq!((range.start, range.end), (0, 2));
        assert_eq!(s.session.thumbs().issued(), 2);
    }

    #[test]
    fn test_scan_failure_notice_is_engine_text() {
        let mut s = screen();
        s.folder_input = "/locked".into();
        let _ = s.update(Message::Open);

        let _ = s.update(Message::Scanned(ScanCompletion {
            id: ScanId(1),
            outcome: ScanOutcome::Failed {
                snapshot: FolderSnapshot::empty(ScanId(1), "/locked"),
                failure: ScanFailure {
                    source: BridgeError::Engine("打开路径失败(/locked)".into()),
                },
            },
        }));

        assert_eq!(s.notice, Some(Notice::error("打开路径失败(/locked)")));
        assert_eq!(s.session.snapshot().len(), 0);
    }

    #[test]
    fn test_selection_without_password_stays_local() {
        let mut s = screen();
        open(&mut s, 1, "/d", &["a.cry"]);

        let _ = s.update(Message::Select("/d/a.cry".into()));
        assert!(matches!(s.preview.state(), PreviewState::ThumbnailOnly { .. }));

        // Unknown paths are ignored
        let _ = s.update(Message::Select("/elsewhere/z.cry".into()));
        assert_eq!(s.preview.state().item_path(), Some("/d/a.cry"));
    }
}
