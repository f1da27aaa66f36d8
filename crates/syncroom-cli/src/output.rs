//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use syncroom_core::{Role, RoomId, SessionState};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the session state reported by the daemon
    pub fn print_status(&self, state: &SessionState) {
        match self.format {
            OutputFormat::Human => {
                println!("syncroom Status");
                println!("===============");
                println!();
                match (state.role(), state.room_id()) {
                    (Role::None, _) | (_, None) => println!("Not in a room."),
                    (role, Some(room_id)) => {
                        println!("Role: {}", role);
                        println!("Room: {}", room_id);
                    }
                }
                if let Some(url) = state.last_broadcast_url() {
                    println!("URL:  {}", url);
                }
                if let Some(surface) = state.viewer_surface() {
                    println!("Surface: {}", surface);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::json!(state));
            }
            OutputFormat::Quiet => {
                if let Some(room_id) = state.room_id() {
                    println!("{}", room_id);
                }
            }
        }
    }

    /// Print the room a command entered
    pub fn print_room(&self, role: Role, room_id: &RoomId) {
        match self.format {
            OutputFormat::Human => match role {
                Role::Host => {
                    println!("✓ Hosting room {}", room_id);
                    println!();
                    println!("Viewers can join with:");
                    println!("  syncroom join {}", room_id);
                }
                _ => println!("✓ Joined room {} as {}", room_id, role),
            },
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"role": role, "roomId": room_id})
                );
            }
            OutputFormat::Quiet => println!("{}", room_id),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}
