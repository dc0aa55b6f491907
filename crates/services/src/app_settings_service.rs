use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use kakomon_core::model::{AppSettings, FontSize, Theme};
use storage::documents::SETTINGS_KEY;
use storage::repository::KeyValueStore;

use crate::observer::{Listeners, Subscription};
use crate::persistence::Persistence;

/// Preference flags persisted as one document.
///
/// Changes made before [`AppSettingsService::load`] load first and apply on
/// top of the stored flags.
pub struct AppSettingsService {
    persistence: Persistence,
    settings: Mutex<AppSettings>,
    loaded: AtomicBool,
    theme_listeners: Listeners<Theme>,
    listeners: Listeners<AppSettings>,
}

impl AppSettingsService {
    #[must_use]
    pub fn new(documents: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistence: Persistence::new(documents),
            settings: Mutex::new(AppSettings::default()),
            loaded: AtomicBool::new(false),
            theme_listeners: Listeners::new(),
            listeners: Listeners::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load persisted settings (or defaults if missing or unreadable).
    pub async fn load(&self) -> AppSettings {
        let _writer = self.persistence.writer().await;
        self.load_stored().await
    }

    async fn load_stored(&self) -> AppSettings {
        let settings: AppSettings = self
            .persistence
            .load(SETTINGS_KEY)
            .await
            .unwrap_or_default();
        info!(theme = ?settings.theme, font_size = ?settings.font_size, "settings loaded");
        *self.lock() = settings.clone();
        self.loaded.store(true, Ordering::Release);
        settings
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn get(&self) -> AppSettings {
        self.lock().clone()
    }

    /// Replace all flags at once.
    pub async fn save(&self, settings: AppSettings) -> AppSettings {
        self.update(|current| *current = settings).await
    }

    pub async fn toggle_theme(&self) -> Theme {
        self.update(|s| s.theme = s.theme.toggled()).await.theme
    }

    pub async fn set_theme(&self, theme: Theme) -> AppSettings {
        self.update(|s| s.theme = theme).await
    }

    pub async fn toggle_sound(&self) -> bool {
        self.update(|s| s.sound_enabled = !s.sound_enabled)
            .await
            .sound_enabled
    }

    pub async fn toggle_auto_submit(&self) -> bool {
        self.update(|s| s.auto_submit = !s.auto_submit)
            .await
            .auto_submit
    }

    pub async fn toggle_shuffle_choices(&self) -> bool {
        self.update(|s| s.shuffle_choices = !s.shuffle_choices)
            .await
            .shuffle_choices
    }

    pub async fn set_font_size(&self, font_size: FontSize) -> AppSettings {
        self.update(|s| s.font_size = font_size).await
    }

    /// Called with the new theme whenever it changes.
    pub fn subscribe_theme(&self, listener: impl Fn(&Theme) + Send + Sync + 'static) -> Subscription {
        self.theme_listeners.subscribe(listener)
    }

    /// Called with the full settings after every change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&AppSettings) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn update(&self, change: impl FnOnce(&mut AppSettings)) -> AppSettings {
        let _writer = self.persistence.writer().await;
        if !self.is_loaded() {
            self.load_stored().await;
        }
        let (before, after) = {
            let mut settings = self.lock();
            let before = settings.theme;
            change(&mut settings);
            (before, settings.clone())
        };
        self.persistence.save(SETTINGS_KEY, &after).await;
        if before != after.theme {
            self.theme_listeners.notify(&after.theme);
        }
        self.listeners.notify(&after);
        after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::repository::{InMemoryStore, UnavailableStore};

    #[tokio::test]
    async fn defaults_when_nothing_stored() {
        let service = AppSettingsService::new(Arc::new(InMemoryStore::new()));
        let settings = service.load().await;
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.font_size, FontSize::Medium);
        assert!(settings.sound_enabled);
        assert!(settings.auto_submit);
        assert!(!settings.shuffle_choices);
    }

    #[tokio::test]
    async fn toggles_persist_before_returning() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let service = AppSettingsService::new(Arc::clone(&store));
        service.load().await;

        assert_eq!(service.toggle_theme().await, Theme::Light);
        assert!(!service.toggle_sound().await);
        assert!(service.toggle_shuffle_choices().await);
        service.set_font_size(FontSize::Large).await;

        let reloaded = AppSettingsService::new(store).load().await;
        assert_eq!(reloaded.theme, Theme::Light);
        assert!(!reloaded.sound_enabled);
        assert!(reloaded.shuffle_choices);
        assert_eq!(reloaded.font_size, FontSize::Large);
        assert!(reloaded.auto_submit);
    }

    #[tokio::test]
    async fn theme_listeners_fire_only_on_theme_change() {
        let service = AppSettingsService::new(Arc::new(InMemoryStore::new()));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let _sub = service.subscribe_theme(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        service.toggle_sound().await;
        service.set_theme(Theme::Dark).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        service.toggle_theme().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_storage_still_applies_changes() {
        let service = AppSettingsService::new(Arc::new(UnavailableStore));
        service.load().await;
        assert!(!service.toggle_auto_submit().await);
        assert!(!service.get().auto_submit);
    }

    #[tokio::test]
    async fn change_before_load_applies_over_stored_flags() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let first = AppSettingsService::new(Arc::clone(&store));
        first.load().await;
        first.toggle_theme().await;
        first.set_font_size(FontSize::Small).await;

        let second = AppSettingsService::new(Arc::clone(&store));
        assert!(!second.is_loaded());
        assert!(!second.toggle_sound().await);
        assert!(second.is_loaded());

        let reloaded = AppSettingsService::new(store).load().await;
        assert_eq!(reloaded.theme, Theme::Light);
        assert_eq!(reloaded.font_size, FontSize::Small);
        assert!(!reloaded.sound_enabled);
    }
}
