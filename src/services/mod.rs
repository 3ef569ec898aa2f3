// bookmark-sync services
// Services provide supporting functionality around the synchronizer.

pub mod settings_engine;
