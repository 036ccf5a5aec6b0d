// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! A render-tick consumer: every tick it reads the pipeline's current texture
//! and draws it with Unicode half-block characters (two pixels per cell).

use crate::backends::camera::CaptureProvider;
use crate::errors::AppResult;
use crate::pipeline::{CameraTexturePipeline, CaptureConfiguration, CaptureState, PipelineEvent};
use crate::snapshot::save_snapshot;
use crate::texture::{CpuTexture, CpuTextureFactory, PublishedTexture};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info};

/// Run the terminal preview until the user quits
pub fn run(
    provider: Arc<dyn CaptureProvider>,
    configuration: CaptureConfiguration,
    snapshot_dir: &Path,
) -> AppResult<()> {
    let pipeline = CameraTexturePipeline::create(provider, configuration, CpuTextureFactory::new())?;
    pipeline.start_capture()?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &pipeline, snapshot_dir);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    pipeline.stop_capture()?;
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    pipeline: &CameraTexturePipeline<CpuTextureFactory>,
    snapshot_dir: &Path,
) -> AppResult<()> {
    info!(device = %pipeline.device().name, "Terminal preview started");

    let mut events = pipeline.subscribe();
    let mut show_help = false;
    let mut notice: Option<String> = None;

    loop {
        // Interruptions arrive asynchronously; surface the latest one
        loop {
            match events.try_recv() {
                Ok(PipelineEvent::Interrupted { reason, .. }) => {
                    notice = Some(format!("{} ('r' to restart)", reason));
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        let frame_widget = FrameWidget {
            texture: pipeline.current_texture(),
        };
        let status_message = if show_help {
            HELP_MESSAGE.to_string()
        } else {
            build_status_message(pipeline, notice.as_deref())
        };

        terminal.draw(|f| {
            let area = f.area();

            let camera_area = Rect {
                height: area.height.saturating_sub(1),
                ..area
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if event::poll(Duration::from_millis(crate::constants::timing::CONSUMER_TICK_MS))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('h') => show_help = !show_help,
                KeyCode::Char('p') => {
                    show_help = false;
                    if let Some(texture) = &frame_widget.texture {
                        notice = Some(match save_snapshot(texture, snapshot_dir) {
                            Ok(path) => format!("Saved: {}", path.display()),
                            Err(e) => {
                                error!("Failed to save snapshot: {}", e);
                                format!("Error: {}", e)
                            }
                        });
                    }
                }
                KeyCode::Char('s') => {
                    show_help = false;
                    let result = if pipeline.state() == CaptureState::Running {
                        pipeline.stop_capture()
                    } else {
                        pipeline.start_capture()
                    };
                    notice = result.err().map(|e| format!("Error: {}", e));
                }
                KeyCode::Char('r') => {
                    show_help = false;
                    notice = pipeline.start_capture().err().map(|e| format!("Error: {}", e));
                }
                _ => {}
            }
        }
    }

    Ok(())
}

const HELP_MESSAGE: &str =
    "p: Save snapshot | s: Pause/resume | r: Restart | h: Toggle help | q/Ctrl+C: Quit";

fn build_status_message(
    pipeline: &CameraTexturePipeline<CpuTextureFactory>,
    notice: Option<&str>,
) -> String {
    let stats = pipeline.stats();
    let mut msg = format!(
        "{} [{}] {} textures, {} dropped",
        pipeline.device().name,
        pipeline.state(),
        stats.published,
        stats.dropped()
    );
    if let Some(notice) = notice {
        msg.push_str(" | ");
        msg.push_str(notice);
    }
    msg.push_str(" | 'h' help");
    msg
}

/// Widget that renders the current texture using half-block characters
struct FrameWidget {
    texture: Option<Arc<PublishedTexture<CpuTexture>>>,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(published) = &self.texture else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        let texture = published.texture();
        if area.width == 0 || area.height == 0 {
            return;
        }

        let (display_width, display_height) =
            fit_to_area(texture.width(), texture.height(), area.width, area.height);
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width - display_width) / 2;
        let y_offset = area.y + (area.height - display_height) / 2;
        let x_scale = texture.width() as f64 / display_width as f64;
        let y_scale = texture.height() as f64 / (display_height as f64 * 2.0);

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(to_color(texture.sample(src_x, src_y_top)));
                    cell.set_bg(to_color(texture.sample(src_x, src_y_bottom)));
                }
            }
        }
    }
}

/// Largest cell rectangle with the texture's aspect ratio (cells are two pixels tall)
fn fit_to_area(width: u32, height: u32, cols: u16, rows: u16) -> (u16, u16) {
    let aspect = width as f64 / height.max(1) as f64;
    let term_width = cols as f64;
    let term_height = rows as f64 * 2.0;

    let (w, h) = if term_width / term_height > aspect {
        (term_height * aspect, term_height)
    } else {
        (term_width, term_width / aspect)
    };
    ((w as u16).min(cols), ((h / 2.0) as u16).min(rows))
}

fn to_color([r, g, b, _]: [u8; 4]) -> Color {
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_keeps_aspect_ratio() {
        // 640x480 into 80x24 cells (80x48 pixels): height bound
        assert_eq!(fit_to_area(640, 480, 80, 24), (64, 24));
        // Wide frame into a tall area: width bound
        assert_eq!(fit_to_area(1920, 1080, 40, 40), (40, 11));
    }
}
