//! Console frontend
//!
//! A line-oriented REPL over the operator shell. Commands run on the
//! calling thread; events are printed by a separate thread as they arrive.

use foamsender_core::{Axis, EventReceiver, JogDirection, RecvError, SenderEvent};
use foamsender_settings::Config;
use foamsender_ui::{Shell, ShellCommand};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

pub const HELP: &str = "\
Commands:
  ports              refresh the serial port list
  port <id>          select a port
  open               open the selected port
  close              close the port
  file <path>        select a G-code file
  send               stream the selected file
  step <mm>          set the jog step
  jog <axis><+|->    jog one axis, e.g. jog x- or jog A+
  status             show the current selection
  help               show this text
  quit               exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Shell(ShellCommand),
    Status,
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `Ok(None)`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "ports" | "refresh" => ConsoleCommand::Shell(ShellCommand::RefreshPorts),
        "port" => ConsoleCommand::Shell(ShellCommand::SelectPort(required(arg, "port <id>")?)),
        "open" => ConsoleCommand::Shell(ShellCommand::OpenPort),
        "close" => ConsoleCommand::Shell(ShellCommand::ClosePort),
        "file" => {
            let path = required(arg, "file <path>")?;
            ConsoleCommand::Shell(ShellCommand::SelectFile(Some(PathBuf::from(path))))
        }
        "send" => ConsoleCommand::Shell(ShellCommand::SendFile),
        "step" => {
            let value = required(arg, "step <mm>")?;
            let step = value
                .parse::<f64>()
                .map_err(|_| format!("Not a number: {}", value))?;
            ConsoleCommand::Shell(ShellCommand::SetStepSize(step))
        }
        "jog" => {
            let (axis, direction) = parse_jog(arg)?;
            ConsoleCommand::Shell(ShellCommand::Jog { axis, direction })
        }
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command: {} (try 'help')", other)),
    };
    Ok(Some(command))
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("Usage: {}", usage))
    } else {
        Ok(arg.to_string())
    }
}

fn parse_jog(arg: &str) -> Result<(Axis, JogDirection), String> {
    let arg = arg.replace(char::is_whitespace, "");
    let mut chars = arg.chars();
    let (Some(letter), Some(sign), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err("Usage: jog <axis><+|->".to_string());
    };
    let axis = Axis::from_letter(letter).ok_or_else(|| format!("Unknown axis: {}", letter))?;
    let direction = match sign {
        '+' => JogDirection::Positive,
        '-' => JogDirection::Negative,
        other => return Err(format!("Direction must be + or -, got {}", other)),
    };
    Ok((axis, direction))
}

/// One-paragraph summary of the shell's selection
pub fn describe(shell: &Shell) -> String {
    let port = shell.selected_port().unwrap_or("none");
    let file = shell
        .selected_file()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "none".to_string());
    let mut text = format!(
        "State: {:?}\nPort: {}\nFile: {}\nStep: {} mm",
        shell.state(),
        port,
        file,
        shell.step_size()
    );
    for info in shell.ports() {
        text.push_str(&format!("\n  {}", info.label()));
    }
    if let Some(status) = shell.status() {
        text.push_str(&format!("\nStatus: {}", status));
    }
    text
}

/// Console rendering of an event, `None` for events not worth a line
pub fn format_event(event: &SenderEvent) -> Option<String> {
    match event {
        SenderEvent::Progress { .. } => None,
        SenderEvent::LineSent { line, .. } => Some(format!("> {}", line)),
        other => Some(other.to_string()),
    }
}

fn spawn_printer(mut events: EventReceiver) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console-events".to_string())
        .spawn(move || loop {
            match events.blocking_recv() {
                Ok(event) => {
                    if let Some(text) = format_event(&event) {
                        println!("{}", text);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    println!("({} events skipped)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        })
}

/// Run the REPL on stdin until `quit` or end of input
pub fn run(config: &Config) -> anyhow::Result<()> {
    let mut shell = Shell::from_config(config);
    let printer = spawn_printer(shell.events().subscribe())?;

    println!("{}", HELP);
    shell.dispatch(ShellCommand::RefreshPorts);

    for line in io::stdin().lock().lines() {
        match parse_command(&line?) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
            Ok(Some(ConsoleCommand::Status)) => println!("{}", describe(&shell)),
            Ok(Some(ConsoleCommand::Shell(command))) => {
                shell.dispatch(command);
            }
            Err(message) => eprintln!("{}", message),
        }
    }

    // Dropping the shell closes the event channel and stops the printer.
    drop(shell);
    if printer.join().is_err() {
        tracing::warn!("Event printer panicked");
    }
    Ok(())
}
