/// Encrypt route: bulk encrypt or decrypt one folder
use iced::widget::{button, column, row, text, text_input};
use iced::{Element, Length, Task};

use super::Notice;
use crate::bridge::SharedEngine;
use crate::state::catalog::{ContainerCatalog, ScanCompletion};
use crate::state::folder_ops::{
    validate_decrypt, validate_encrypt, Admission, FolderOpCompletion, FolderOpJob, FolderOpSerializer, ValidationFailure,
};

#[derive(Debug, Clone)]
pub enum Message {
    FolderChanged(String),
    /// Count the encrypted files in the chosen folder
    Count,
    Counted(ScanCompletion),
    PrimaryChanged(String),
    BackupChanged(String),
    DecryptPasswordChanged(String),
    Encrypt,
    Decrypt,
    Finished(FolderOpCompletion),
}

pub struct EncryptScreen {
    engine: SharedEngine,
    /// Scans the chosen folder to count its containers
    catalog: ContainerCatalog,
    /// Single-flight guard for encrypt and decrypt
    ops: FolderOpSerializer,
    folder: String,
    primary: String,
    backup: String,
    /// Either enrolled password, for a folder decrypt
    decrypt_password: String,
    /// Containers found by the latest count, `None` until one lands
    encrypted_count: Option<usize>,
    notice: Option<Notice>,
}

impl EncryptScreen {
    pub fn new(engine: SharedEngine, suffix: &str, min_password_len: usize) -> Self {
        Self {
            engine,
            catalog: ContainerCatalog::new(suffix),
            ops: FolderOpSerializer::new(min_password_len),
            folder: String::new(),
            primary: String::new(),
            backup: String::new(),
            decrypt_password: String::new(),
            encrypted_count: None,
            notice: None,
        }
    }

    /// Primary first, then backup
    fn passwords(&self) -> Vec<String> {
        vec![self.primary.clone(), self.backup.clone()]
    }

    fn can_encrypt(&self) -> bool {
        !self.ops.is_busy() && validate_encrypt(&self.folder, &self.passwords(), self.ops.min_password_len()).is_ok()
    }

    fn can_decrypt(&self) -> bool {
        !self.ops.is_busy() && validate_decrypt(&self.folder, &self.decrypt_password, self.ops.min_password_len()).is_ok()
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::FolderChanged(folder) => {
                // A count still running belongs to the old folder
                self.folder = folder;
                self.encrypted_count = None;
                self.catalog.cancel();
                Task::none()
            }
            Message::Count => self.count(),
            Message::Counted(completion) => {
                if let Some(outcome) = self.catalog.finish(completion) {
                    match outcome.failure() {
                        Some(failure) => {
                            self.encrypted_count = None;
                            self.notice = Some(Notice::error(failure.to_string()));
                        }
                        None => self.encrypted_count = Some(outcome.snapshot().len()),
                    }
                }
                Task::none()
            }
            Message::PrimaryChanged(password) => {
                self.primary = password;
                Task::none()
            }
            Message::BackupChanged(password) => {
                self.backup = password;
                Task::none()
            }
            Message::DecryptPasswordChanged(password) => {
                self.decrypt_password = password;
                Task::none()
            }
            Message::Encrypt => {
                let passwords = self.passwords();
                let admission = self.ops.request_encrypt(&self.folder, &passwords);
                self.admit(admission)
            }
            Message::Decrypt => {
                let admission = self.ops.request_decrypt(&self.folder, &self.decrypt_password);
                self.admit(admission)
            }
            Message::Finished(completion) => {
                let Some(result) = self.ops.finish(completion) else {
                    return Task::none();
                };

                // Engine text is shown as is, then the count is refreshed
                self.notice = Some(match &result.outcome {
                    Ok(message) => Notice::info(message.as_str()),
                    Err(message) => Notice::error(message.as_str()),
                });
                self.count()
            }
        }
    }

    fn admit(&mut self, admission: Result<Admission, ValidationFailure>) -> Task<Message> {
        match admission {
            Ok(Admission::Accepted(job)) => {
                self.notice = None;
                self.run(job)
            }
            Ok(Admission::Ignored) => Task::none(),
            Err(failure) => {
                self.notice = Some(Notice::error(failure.to_string()));
                Task::none()
            }
        }
    }

    fn run(&self, job: FolderOpJob) -> Task<Message> {
        Task::perform(job.run(self.engine.clone()), Message::Finished)
    }

    /// Scan the folder for the "N encrypted files" line
    fn count(&mut self) -> Task<Message> {
        let folder = self.folder.trim();
        if folder.is_empty() {
            return Task::none();
        }
        let request = self.catalog.begin_scan(folder);
        Task::perform(request.run(self.engine.clone()), Message::Counted)
    }

    pub fn view(&self) -> Element<'_, Message> {
        let min = self.ops.min_password_len();

        let folder_row = row![
            text_input("Folder to encrypt or decrypt", &self.folder)
                .on_input(Message::FolderChanged)
                .on_submit(Message::Count)
                .padding(8),
            button("Check").on_press(Message::Count).padding(8),
        ]
        .spacing(8);

        let count = match self.encrypted_count {
            Some(n) => text(format!("{} encrypted files", n)),
            None => text(""),
        };

        let encrypt = column![
            text("Encrypt").size(20),
            text_input(&format!("Primary password (at least {} characters)", min), &self.primary)
                .on_input(Message::PrimaryChanged)
                .secure(true)
                .padding(8),
            text_input(&format!("Backup password (at least {} characters)", min), &self.backup)
                .on_input(Message::BackupChanged)
                .secure(true)
                .padding(8),
            button("Encrypt folder")
                .on_press_maybe(self.can_encrypt().then_some(Message::Encrypt))
                .padding(10),
        ]
        .spacing(8)
        .width(Length::Fill);

        let decrypt = column![
            text("Decrypt").size(20),
            text_input("Either password", &self.decrypt_password)
                .on_input(Message::DecryptPasswordChanged)
                .on_submit(Message::Decrypt)
                .secure(true)
                .padding(8),
            button("Decrypt folder")
                .on_press_maybe(self.can_decrypt().then_some(Message::Decrypt))
                .padding(10),
        ]
        .spacing(8)
        .width(Length::Fill);

        let status = Notice::view(if self.ops.is_busy() { None } else { self.notice.as_ref() });
        let busy = text(if self.ops.is_busy() { "Working..." } else { "" });

        column![folder_row, count, row![encrypt, decrypt].spacing(24), busy, status]
            .spacing(12)
            .padding(12)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fake::FakeEngine;
    use crate::state::catalog::ScanOutcome;
    use crate::state::data::{ContainerItem, FolderSnapshot, ScanId};
    use crate::state::folder_ops::FolderOpStatus;
    use std::sync::Arc;

    fn screen(fake: &FakeEngine) -> EncryptScreen {
        let engine: SharedEngine = Arc::new(fake.clone());
        EncryptScreen::new(engine, ".cry", 6)
    }

    #[test]
    fn test_encrypt_enabled_only_when_valid() {
        let fake = FakeEngine::new();
        let mut s = screen(&fake);
        assert!(!s.can_encrypt());

        let _ = s.update(Message::FolderChanged("/d".into()));
        let _ = s.update(Message::PrimaryChanged("secret1".into()));
        assert!(!s.can_encrypt());

        let _ = s.update(Message::BackupChanged("short".into()));
        assert!(!s.can_encrypt());

        let _ = s.update(Message::BackupChanged("secret2".into()));
        assert!(s.can_encrypt());
        assert!(!s.can_decrypt());
    }

    #[test]
    fn test_invalid_press_is_rejected_locally() {
        let fake = FakeEngine::new();
        let mut s = screen(&fake);
        let _ = s.update(Message::FolderChanged("/d".into()));
        let _ = s.update(Message::PrimaryChanged("secret1".into()));
        let _ = s.update(Message::BackupChanged("secret1".into()));

        let _ = s.update(Message::Encrypt);

        assert_eq!(s.ops.status(), &FolderOpStatus::Idle);
        assert!(s.notice.as_ref().is_some_and(|n| n.is_error));
        assert_eq!(fake.folder_calls(), 0);
    }

    #[tokio::test]
    async fn test_completion_clears_busy_and_shows_engine_message() {
        let fake = FakeEngine::new().with_file("/d/a.jpg", b"a");
        let mut s = screen(&fake);
        let _ = s.update(Message::FolderChanged("/d".into()));
        let _ = s.update(Message::PrimaryChanged("secret1".into()));
        let _ = s.update(Message::BackupChanged("secret2".into()));
        let _ = s.update(Message::DecryptPasswordChanged("secret1".into()));

        let passwords = s.passwords();
        let job = match s.ops.request_encrypt("/d", &passwords) {
            Ok(Admission::Accepted(job)) => job,
            _ => panic!("encrypt not accepted"),
        };
        assert!(!s.can_encrypt());
        assert!(!s.can_decrypt());

        // A second press while busy is ignored
        let _ = s.update(Message::Decrypt);
        assert!(s.ops.is_busy());

        let completion = job.run(s.engine.clone()).await;
        let _ = s.update(Message::Finished(completion));

        assert!(!s.ops.is_busy());
        assert_eq!(s.notice, Some(Notice::info("加密完毕：/d，1 个文件")));
        assert!(s.catalog.is_scanning());
        assert_eq!(fake.folder_calls(), 1);
    }

    #[test]
    fn test_count_reflects_latest_scan() {
        let fake = FakeEngine::new();
        let mut s = screen(&fake);
        let _ = s.update(Message::FolderChanged("/d".into()));
        let _ = s.update(Message::Count);

        let items = vec![ContainerItem::file("/d/a.cry"), ContainerItem::file("/d/b.cry")];
        let _ = s.update(Message::Counted(ScanCompletion {
            id: ScanId(1),
            outcome: ScanOutcome::Listed(FolderSnapshot::new(ScanId(1), "/d", items)),
        }));
        assert_eq!(s.encrypted_count, Some(2));

        let _ = s.update(Message::FolderChanged("/e".into()));
        assert_eq!(s.encrypted_count, None);
    }

    #[test]
    fn test_count_for_previous_folder_is_dropped() {
        let fake = FakeEngine::new();
        let mut s = screen(&fake);
        let _ = s.update(Message::FolderChanged("/a".into()));
        let _ = s.update(Message::Count);
        let _ = s.update(Message::FolderChanged("/b".into()));

        // The listing of /a lands after the user moved on to /b
        let items = vec![
            ContainerItem::file("/a/x.cry"),
            ContainerItem::file("/a/y.cry"),
            ContainerItem::file("/a/z.cry"),
        ];
        let _ = s.update(Message::Counted(ScanCompletion {
            id: ScanId(1),
            outcome: ScanOutcome::Listed(FolderSnapshot::new(ScanId(1), "/a", items)),
        }));

        assert_eq!(s.encrypted_count, None);
        assert!(!s.catalog.is_scanning());
    }
}
