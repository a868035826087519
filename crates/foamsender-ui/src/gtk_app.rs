//! GTK4 window
//!
//! Widgets only post [`ShellCommand`]s; the shell runs on a worker thread
//! and its events are polled back onto the main loop.

use crate::shell::{spawn_worker, Shell, ShellCommand, ShellHandle};
use foamsender_core::{
    Axis, EventReceiver, JogDirection, SenderEvent, StatusMessage, TryRecvError,
};
use foamsender_settings::Config;
use gtk4::prelude::*;
use gtk4::{
    glib, ApplicationWindow, Box, Button, ComboBoxText, FileChooserAction, FileChooserDialog,
    FileFilter, Grid, Label, Orientation, ProgressBar, ResponseType, SpinButton,
};
use libadwaita::Application as AdwApplication;
use std::time::Duration;

const APP_ID: &str = "io.github.foamsender";
const EVENT_POLL: Duration = Duration::from_millis(50);

/// Widgets updated from shell events
#[derive(Clone)]
struct Widgets {
    port_combo: ComboBoxText,
    connection_label: Label,
    file_label: Label,
    progress: ProgressBar,
    step_spin: SpinButton,
    status_label: Label,
}

pub fn run(config: Config) -> glib::ExitCode {
    let app = AdwApplication::builder().application_id(APP_ID).build();

    app.connect_activate(move |app| build_window(app, &config));

    // Command line arguments belong to the binary, not to GTK.
    app.run_with_args::<&str>(&[])
}

fn build_window(app: &AdwApplication, config: &Config) {
    let shell = Shell::from_config(config);
    let events = shell.events().subscribe();
    let commands = match spawn_worker(shell) {
        Ok((commands, _worker)) => commands,
        Err(e) => {
            tracing::error!("Failed to start shell worker: {}", e);
            return;
        }
    };

    let window = ApplicationWindow::builder()
        .application(app)
        .title("FoamSender")
        .default_width(520)
        .default_height(420)
        .build();

    let main_box = Box::new(Orientation::Vertical, 8);
    main_box.set_margin_top(12);
    main_box.set_margin_bottom(12);
    main_box.set_margin_start(12);
    main_box.set_margin_end(12);

    // Connection row
    let port_row = Box::new(Orientation::Horizontal, 6);
    let port_combo = ComboBoxText::new();
    port_combo.set_hexpand(true);
    let refresh_button = Button::with_label("Refresh");
    let open_button = Button::with_label("Open");
    let close_button = Button::with_label("Close");
    port_row.append(&Label::new(Some("Port:")));
    port_row.append(&port_combo);
    port_row.append(&refresh_button);
    port_row.append(&open_button);
    port_row.append(&close_button);
    let connection_label = Label::new(Some("Disconnected"));
    connection_label.set_xalign(0.0);

    // File row
    let file_row = Box::new(Orientation::Horizontal, 6);
    let file_label = Label::new(Some("No file selected"));
    file_label.set_hexpand(true);
    file_label.set_xalign(0.0);
    let select_button = Button::with_label("Select File");
    let send_button = Button::with_label("Send");
    let cancel_button = Button::with_label("Cancel");
    file_row.append(&file_label);
    file_row.append(&select_button);
    file_row.append(&send_button);
    file_row.append(&cancel_button);

    let progress = ProgressBar::new();
    progress.set_show_text(true);

    // Jog panel
    let machine = &config.machine;
    let step_row = Box::new(Orientation::Horizontal, 6);
    let step_spin = SpinButton::with_range(machine.jog_step_min, machine.jog_step_max, 0.1);
    step_spin.set_digits(2);
    step_spin.set_value(machine.jog_step_mm);
    step_row.append(&Label::new(Some("Step (mm):")));
    step_row.append(&step_spin);

    let jog_grid = Grid::new();
    jog_grid.set_row_spacing(4);
    jog_grid.set_column_spacing(4);
    for (row, axis) in Axis::ALL.into_iter().enumerate() {
        let row = row as i32;
        for (col, direction) in [JogDirection::Negative, JogDirection::Positive]
            .into_iter()
            .enumerate()
        {
            let button = Button::with_label(&format!("{}{}", axis, direction));
            let tx = commands.clone();
            button.connect_clicked(move |_| {
                post(&tx, ShellCommand::Jog { axis, direction });
            });
            jog_grid.attach(&button, col as i32, row, 1, 1);
        }
    }

    let status_label = Label::new(None);
    status_label.set_xalign(0.0);

    main_box.append(&port_row);
    main_box.append(&connection_label);
    main_box.append(&file_row);
    main_box.append(&progress);
    main_box.append(&step_row);
    main_box.append(&jog_grid);
    main_box.append(&status_label);
    window.set_child(Some(&main_box));

    let tx = commands.clone();
    refresh_button.connect_clicked(move |_| post(&tx, ShellCommand::RefreshPorts));

    let tx = commands.clone();
    port_combo.connect_changed(move |combo| {
        if let Some(port) = combo.active_id() {
            post(&tx, ShellCommand::SelectPort(port.to_string()));
        }
    });

    let tx = commands.clone();
    open_button.connect_clicked(move |_| post(&tx, ShellCommand::OpenPort));

    let tx = commands.clone();
    close_button.connect_clicked(move |_| post(&tx, ShellCommand::ClosePort));

    let tx = commands.clone();
    let parent = window.clone();
    select_button.connect_clicked(move |_| choose_file(&parent, tx.clone()));

    let tx = commands.clone();
    send_button.connect_clicked(move |_| post(&tx, ShellCommand::SendFile));

    let tx = commands.clone();
    cancel_button.connect_clicked(move |_| tx.cancel());

    let tx = commands.clone();
    step_spin.connect_value_changed(move |spin| {
        post(&tx, ShellCommand::SetStepSize(spin.value()));
    });

    let widgets = Widgets {
        port_combo,
        connection_label,
        file_label,
        progress,
        step_spin,
        status_label,
    };
    poll_events(events, widgets);

    post(&commands, ShellCommand::RefreshPorts);
    window.present();
}

fn post(commands: &ShellHandle, command: ShellCommand) {
    if !commands.post(command) {
        tracing::warn!("Shell worker is gone, command dropped");
    }
}

#[allow(deprecated)]
fn choose_file(parent: &ApplicationWindow, commands: ShellHandle) {
    let dialog = FileChooserDialog::new(
        Some("Select G-code File"),
        Some(parent),
        FileChooserAction::Open,
        &[
            ("Cancel", ResponseType::Cancel),
            ("Open", ResponseType::Accept),
        ],
    );

    let filter = FileFilter::new();
    filter.set_name(Some("G-code Files"));
    for pattern in ["*.gcode", "*.nc", "*.ngc", "*.txt"] {
        filter.add_pattern(pattern);
    }
    dialog.add_filter(&filter);

    dialog.connect_response(move |d, response| {
        let path = if response == ResponseType::Accept {
            d.file().and_then(|file| file.path())
        } else {
            None
        };
        post(&commands, ShellCommand::SelectFile(path));
        d.close();
    });

    dialog.show();
}

fn poll_events(mut events: EventReceiver, widgets: Widgets) {
    glib::timeout_add_local(EVENT_POLL, move || loop {
        match events.try_recv() {
            Ok(event) => apply_event(&widgets, event),
            Err(TryRecvError::Empty) => return glib::ControlFlow::Continue,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("UI fell behind, {} events skipped", skipped);
            }
            Err(TryRecvError::Closed) => return glib::ControlFlow::Break,
        }
    });
}

fn apply_event(widgets: &Widgets, event: SenderEvent) {
    match event {
        SenderEvent::PortsRefreshed(ports) => {
            widgets.port_combo.remove_all();
            for port in &ports {
                widgets.port_combo.append(Some(port.as_str()), port);
            }
        }
        SenderEvent::PortSelected(port) => {
            if widgets.port_combo.active_id().as_deref() != Some(port.as_str()) {
                widgets.port_combo.set_active_id(Some(port.as_str()));
            }
        }
        SenderEvent::Connected(port) => {
            widgets
                .connection_label
                .set_text(&format!("Connected to {}", port));
        }
        SenderEvent::Disconnected => widgets.connection_label.set_text("Disconnected"),
        SenderEvent::FileSelected(path) => {
            widgets.file_label.set_text(&path.display().to_string());
            widgets.progress.set_fraction(0.0);
        }
        SenderEvent::TransferStarted(_) => {
            widgets.progress.set_fraction(0.0);
            widgets.progress.set_text(Some("0%"));
        }
        SenderEvent::Progress {
            bytes_read,
            total_bytes,
        } if total_bytes > 0 => {
            let fraction = (bytes_read as f64 / total_bytes as f64).min(1.0);
            widgets.progress.set_fraction(fraction);
            widgets
                .progress
                .set_text(Some(&format!("{:.0}%", fraction * 100.0)));
        }
        SenderEvent::TransferFinished { .. } => {
            widgets.progress.set_fraction(1.0);
            widgets.progress.set_text(Some("100%"));
        }
        SenderEvent::StepSizeChanged(step) => {
            if (widgets.step_spin.value() - step).abs() > f64::EPSILON {
                widgets.step_spin.set_value(step);
            }
        }
        SenderEvent::StatusChanged(status) => show_status(&widgets.status_label, &status),
        _ => {}
    }
}

fn show_status(label: &Label, status: &StatusMessage) {
    label.set_markup(&format!(
        "<span foreground=\"{}\">{}</span>",
        status.level.color(),
        glib::markup_escape_text(&status.text)
    ));
}
