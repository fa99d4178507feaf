use ratatui::style::{Color, Modifier, Style};

pub struct PlayerStyles {
    pub title: Style,
    pub artist: Style,
    pub dim: Style,
    pub accent: Style,
    pub gauge: Style,
    /// Current lyric line, settled.
    pub current: Style,
    /// Current lyric line while cross-fading in.
    pub fading_in: Style,
    pub next: Style,
    pub status: Style,
    pub warning: Style,
}

impl Default for PlayerStyles {
    fn default() -> Self {
        Self {
            title: Style::default().add_modifier(Modifier::BOLD),
            artist: Style::default().fg(Color::Gray),
            dim: Style::default().add_modifier(Modifier::DIM),
            accent: Style::default().fg(Color::Green),
            gauge: Style::default().fg(Color::Green).bg(Color::Black),
            current: Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            fading_in: Style::default().fg(Color::Green).add_modifier(Modifier::DIM),
            next: Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
            status: Style::default().fg(Color::Yellow),
            warning: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }
}
