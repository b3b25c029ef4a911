/// Landing chooser: pick a workflow
use iced::widget::{button, column, container, text};
use iced::{Alignment, Element, Length};

use crate::{Message, Route};

pub fn view() -> Element<'static, Message> {
    let content = column![
        text("CryView").size(48),
        text("Encrypted folders, previewed on demand").size(16),
        button("Browse & preview")
            .on_press(Message::Navigate(Route::Browse))
            .padding(10),
        button("Encrypt / decrypt a folder")
            .on_press(Message::Navigate(Route::Encrypt))
            .padding(10),
    ]
    .spacing(20)
    .padding(40)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
