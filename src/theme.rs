use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Process-wide theme preference.
///
/// Views read the current value with [`ThemeService::get`] and follow
/// changes through a [`watch::Receiver`] from [`ThemeService::subscribe`].
#[derive(Debug)]
pub struct ThemeService {
    sender: watch::Sender<Theme>,
}

impl ThemeService {
    pub fn new(initial: Theme) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn get(&self) -> Theme {
        *self.sender.borrow()
    }

    pub fn set(&self, theme: Theme) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == theme {
                false
            } else {
                *current = theme;
                true
            }
        });
        if changed {
            tracing::debug!(?theme, "theme changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.sender.subscribe()
    }
}

/// Series colours, cycled when a chart has more series than entries.
pub const SERIES_PALETTE: [&str; 7] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff8042", "#0088FE", "#00C49F", "#FFBB28",
];

pub fn series_color(index: usize) -> &'static str {
    SERIES_PALETTE[index % SERIES_PALETTE.len()]
}

/// Chrome colours for a rendered chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartStyle {
    pub theme: Theme,
    pub grid: &'static str,
    pub axis: &'static str,
    pub tick: &'static str,
    pub text: &'static str,
    pub background: &'static str,
}

impl ChartStyle {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                theme,
                grid: "#e5e7eb",
                axis: "#d1d5db",
                tick: "#6b7280",
                text: "#111827",
                background: "#ffffff",
            },
            Theme::Dark => Self {
                theme,
                grid: "#334155",
                axis: "#475569",
                tick: "#94a3b8",
                text: "#e2e8f0",
                background: "#0f172a",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_reads_from_config_text() {
        #[derive(Deserialize)]
        struct Section {
            theme: Theme,
        }

        let section: Section = toml::from_str("theme = \"dark\"").unwrap();
        assert_eq!(section.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let service = ThemeService::new(Theme::Light);
        let mut receiver = service.subscribe();

        service.set(Theme::Dark);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), Theme::Dark);
        assert_eq!(service.get(), Theme::Dark);
    }

    #[test]
    fn setting_same_theme_does_not_notify() {
        let service = ThemeService::new(Theme::Dark);
        let receiver = service.subscribe();
        service.set(Theme::Dark);
        assert!(!receiver.has_changed().unwrap());
    }

    #[test]
    fn palette_cycles() {
        assert_eq!(series_color(0), series_color(SERIES_PALETTE.len()));
        assert_eq!(ChartStyle::for_theme(Theme::Dark).grid, "#334155");
    }
}
