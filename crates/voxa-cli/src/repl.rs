//! REPL – the interactive operator shell.
//!
//! Supported slash-commands:
//!   /help          – show this list
//!   /listen        – start the recognizer
//!   /mute          – stop the recognizer
//!   /mic on|off    – plug or unplug the simulated microphone
//!   /auto          – toggle the autopilot
//!   /halt          – send STOP (halts the autopilot on every peer)
//!   /status        – motion, recognition and link summary
//!   /quit | /exit  – gracefully exit the CLI
//!
//! Any other line is spoken into the simulated recognizer as
//! `word [confidence]`.

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use voxa_kernel::MONITORED_WORDS;
use voxa_runtime::{Session, SimRecognizer};
use voxa_types::{Origin, RecognitionStatus};

/// Confidence given to a spoken word when the line does not carry one.
pub const DEFAULT_SPOKEN_CONFIDENCE: f32 = 0.95;

/// How long to wait for a spoken word to come out of the dispatcher.
const ECHO_WAIT: Duration = Duration::from_millis(250);

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Help,
    Listen,
    Mute,
    Mic(bool),
    Auto,
    Halt,
    Status,
    Quit,
    Say { word: String, confidence: f32 },
    Invalid(String),
}

/// Parse one line of operator input.
pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    if let Some(cmd) = line.strip_prefix('/') {
        let mut parts = cmd.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        return match (name, arg) {
            ("help", _) => Input::Help,
            ("listen", _) => Input::Listen,
            ("mute", _) => Input::Mute,
            ("mic", Some("on")) => Input::Mic(true),
            ("mic", Some("off")) => Input::Mic(false),
            ("mic", _) => Input::Invalid("usage: /mic on|off".to_string()),
            ("auto", _) => Input::Auto,
            ("halt", _) => Input::Halt,
            ("status", _) => Input::Status,
            ("quit" | "exit", _) => Input::Quit,
            _ => Input::Invalid(format!("unknown command '/{name}'")),
        };
    }

    let mut parts = line.split_whitespace();
    let word = parts.next().unwrap_or_default().to_string();
    let confidence = match parts.next() {
        None => DEFAULT_SPOKEN_CONFIDENCE,
        Some(raw) => match raw.parse::<f32>() {
            Ok(c) if (0.0..=1.0).contains(&c) => c,
            _ => return Input::Invalid(format!("confidence must be in [0, 1], got '{raw}'")),
        },
    };
    if parts.next().is_some() {
        return Input::Invalid("say one word at a time".to_string());
    }
    Input::Say { word, confidence }
}

/// Interactive shell over a running [`Session`].
pub struct Shell<'a> {
    session: &'a Session,
    sim: &'a SimRecognizer,
    runtime: Handle,
}

impl<'a> Shell<'a> {
    pub fn new(session: &'a Session, sim: &'a SimRecognizer, runtime: Handle) -> Self {
        Self {
            session,
            sim,
            runtime,
        }
    }

    /// Run until `/quit`, EOF, Ctrl-C, or `shutdown` is set.
    pub fn run(&self, shutdown: Arc<AtomicBool>) {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("{}: {}", "Terminal error".red(), e);
                return;
            }
        };
        // Autopilot and session tasks spawn from this thread.
        let _rt = self.runtime.enter();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            let line = match editor.readline("voxa> ") {
                Ok(line) => line,
                // The editor holds the terminal in raw mode, so Ctrl-C shows
                // up here instead of as SIGINT.
                Err(ReadlineError::Interrupted) => {
                    self.cmd_interrupt();
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    break;
                }
            };
            if !line.trim().is_empty() {
                let _ = editor.add_history_entry(line.as_str());
            }

            match parse_line(&line) {
                Input::Empty => {}
                Input::Help => cmd_help(),
                Input::Listen => self.cmd_listen(),
                Input::Mute => self.cmd_mute(),
                Input::Mic(on) => self.cmd_mic(on),
                Input::Auto => self.cmd_auto(),
                Input::Halt => self.cmd_halt(),
                Input::Status => self.cmd_status(),
                Input::Say { word, confidence } => self.cmd_say(&word, confidence),
                Input::Quit => {
                    println!("{}", "Goodbye.".green());
                    break;
                }
                Input::Invalid(msg) => {
                    println!(
                        "{} {}. Type {} for available commands.",
                        "Error:".red(),
                        msg.yellow(),
                        "/help".bold()
                    );
                }
            }
        }
        shutdown.store(true, Ordering::SeqCst);
    }

    fn cmd_listen(&self) {
        match self.runtime.block_on(self.session.start_listening()) {
            Ok(()) => println!("{}", "● listening".green()),
            Err(e) => println!("{}: {}", "Recognizer failed".red(), e),
        }
    }

    fn cmd_mute(&self) {
        self.runtime.block_on(self.session.stop_listening());
        println!("{}", status_label(self.session.recognition().status));
    }

    fn cmd_mic(&self, on: bool) {
        self.sim.set_available(on);
        if on {
            println!("{}", "microphone connected".green());
            return;
        }
        if self.session.recognition().status == RecognitionStatus::Listening {
            self.runtime
                .block_on(self.session.recognition_failed("audio input lost"));
        }
        println!("{}", "microphone disconnected".yellow());
    }

    fn cmd_auto(&self) {
        if self.session.autopilot_running() {
            self.session.stop_autopilot();
            println!("autopilot {}", "off".yellow());
        } else {
            self.session.start_autopilot();
            println!("autopilot {}", "on".green());
        }
    }

    fn cmd_halt(&self) {
        let outcome = self.session.halt();
        let sent = if outcome.published && self.session.remote_connected() {
            " (sent to peer)"
        } else {
            ""
        };
        println!("{}{}", "STOP".red().bold(), sent.dimmed());
    }

    fn cmd_interrupt(&self) {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());
        self.session.halt();
        println!("{}", "  ✓ STOP sent.".green());
    }

    fn cmd_say(&self, word: &str, confidence: f32) {
        let mut last = self.session.watch_last_command();
        last.borrow_and_update();

        if !self.runtime.block_on(self.sim.feed(word, confidence)) {
            println!(
                "{} type {} first",
                "not listening;".yellow(),
                "/listen".bold()
            );
            return;
        }

        let heard = self
            .runtime
            .block_on(tokio::time::timeout(ECHO_WAIT, last.changed()));
        let event = last.borrow().clone();
        match (heard, event) {
            (Ok(Ok(())), Some(ev)) => println!(
                "→ {} {}",
                ev.command.word().bold().cyan(),
                format!("({:.2})", ev.confidence).dimmed()
            ),
            _ => println!("{}", "(ignored)".dimmed()),
        }
    }

    fn cmd_status(&self) {
        let snap = self.session.snapshot();
        let rec = self.session.recognition();

        println!();
        println!("{}", "Voxa Status".bold().underline());
        println!(
            "  Position   : x {:>6.2}  y {:>6.2}  → x {:>6.2}  y {:>6.2}",
            snap.current_position.x,
            snap.current_position.y,
            snap.target_position.x,
            snap.target_position.y
        );
        println!(
            "  Scroll     : {:.2} (target {:.2})",
            snap.current_scroll, snap.target_scroll
        );
        println!(
            "  Attitude   : roll {:+.3}  pitch {:+.3}",
            snap.roll, snap.pitch
        );
        match self.session.last_command() {
            Some(ev) => {
                let from = match ev.origin {
                    Origin::Local => "local",
                    Origin::Remote => "remote",
                };
                println!("  Last cmd   : {} ({})", ev.command.word().bold(), from);
            }
            None => println!("  Last cmd   : {}", "none".dimmed()),
        }
        println!("  Recognizer : {}", status_label(rec.status));
        if let Some(err) = rec.last_error {
            println!("  Last error : {}", err.red());
        }
        println!(
            "  Remote     : {}",
            if self.session.remote_connected() {
                "connected".green()
            } else {
                "local only".yellow()
            }
        );
        println!(
            "  Autopilot  : {}",
            if self.session.autopilot_running() {
                "on".green()
            } else {
                "off".dimmed()
            }
        );
        println!();
    }
}

fn status_label(status: RecognitionStatus) -> colored::ColoredString {
    match status {
        RecognitionStatus::Idle => "○ idle".dimmed(),
        RecognitionStatus::Loading => "◌ loading".yellow(),
        RecognitionStatus::Listening => "● listening".green(),
        RecognitionStatus::Error => "✕ error".red(),
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Voxa Commands".bold().underline());
    println!("  {}       – start the recognizer", "/listen".bold().cyan());
    println!("  {}         – stop the recognizer", "/mute".bold().cyan());
    println!("  {}  – plug / unplug the microphone", "/mic on|off".bold().cyan());
    println!("  {}         – toggle the autopilot", "/auto".bold().cyan());
    println!("  {}         – send STOP to every peer", "/halt".bold().cyan());
    println!("  {}       – motion and link summary", "/status".bold().cyan());
    println!("  {} – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
    println!(
        "  Anything else is spoken: {} or {}",
        "left".bold(),
        "left 0.6".bold()
    );
    println!("  Vocabulary: {}", MONITORED_WORDS.join(", ").dimmed());
    println!();
}
