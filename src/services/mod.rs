// Tabs Aside services
// Services provide supporting functionality: options, event delivery, change notifications, the tab codec.

pub mod change_notifier;
pub mod event_hub;
pub mod settings_engine;
pub mod tab_codec;
