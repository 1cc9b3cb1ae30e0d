use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::TryRecvError;

use sayclip::adapters::{ClipboardOutput, CpalBackend, TomlConfigStore, WhisperCppEngine};
use sayclip::infrastructure::init_logging;
use sayclip::ports::{ConfigStore, TextOutput};
use sayclip::{AppState, CoreEvent, DictationController, Marshal};

struct CliArgs {
    list_devices: bool,
    list_models: bool,
    model: Option<String>,
    device: Option<String>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs {
        list_devices: false,
        list_models: false,
        model: None,
        device: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list-devices" => args.list_devices = true,
            "--list-models" => args.list_models = true,
            "--model" => args.model = Some(iter.next().context("--model needs a name")?),
            "--device" => args.device = Some(iter.next().context("--device needs an id")?),
            "--help" | "-h" => {
                println!(
                    "sayclip - local voice dictation to the clipboard\n\n\
                     Usage: sayclip [--model NAME] [--device ID] [--list-devices] [--list-models]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let store = TomlConfigStore::new()?;
    let mut config = store.load()?;
    if let Some(model) = args.model {
        config.transcription.model = model;
    }
    if let Some(device) = args.device {
        config.audio.device = Some(device);
    }

    let _log_guard = init_logging(
        &store.logs_dir(),
        &config.logging.level,
        config.logging.file_logging,
    )?;

    let runtime = tokio::runtime::Runtime::new()?;
    let backend = Arc::new(CpalBackend::new()?);
    let engine = Arc::new(WhisperCppEngine::new(
        store.models_dir(),
        config.transcription.threads,
        config.transcription.language.clone(),
    ));

    if args.list_devices {
        use sayclip::ports::AudioBackend;
        for device in backend.list_input_devices()? {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.id, marker);
        }
        return Ok(());
    }
    if args.list_models {
        use sayclip::ports::SpeechEngine;
        for model in engine.available_models() {
            println!("{model}");
        }
        return Ok(());
    }

    let clipboard = ClipboardOutput::new()?;

    // This thread is the owner context: it drains the marshal pump and is
    // the only place controller methods are called.
    let (marshal, mut pump) = Marshal::channel();
    let controller = DictationController::new(
        backend,
        engine,
        marshal,
        runtime.handle().clone(),
        config,
    );
    let mut events = controller.subscribe();
    controller.initialize();

    // Enter toggles recording; closing stdin (Ctrl-D) exits.
    let (key_tx, key_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || key_tx.send(()).is_err() {
                break;
            }
        }
    });

    println!("press Enter to start/stop recording, Ctrl-D to quit");

    let mut last_recording: Option<PathBuf> = None;
    'main: loop {
        pump.drain();

        loop {
            match events.try_recv() {
                Ok(event) => match event {
                    CoreEvent::StateChanged { state, status } => {
                        println!("[{state:?}] {status}");
                    }
                    CoreEvent::FileReady { path } => {
                        last_recording = Some(path);
                    }
                    CoreEvent::TranscriptionComplete { text } => {
                        if let Err(err) = clipboard.deliver(&text) {
                            eprintln!("clipboard error: {err}");
                        }
                        println!("{text}");
                        if let Some(path) = last_recording.take() {
                            if let Err(err) = controller.delete_recording(&path) {
                                eprintln!("could not remove {}: {err}", path.display());
                            }
                        }
                    }
                    CoreEvent::AudioError { message }
                    | CoreEvent::TranscriptionError { message } => {
                        eprintln!("error: {message}");
                    }
                    CoreEvent::RecordingStarted
                    | CoreEvent::RecordingStopped
                    | CoreEvent::ModelLoaded { .. } => {}
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => break 'main,
            }
        }

        match key_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(()) => {
                if controller.state() == AppState::Recording {
                    controller.stop_recording();
                } else {
                    controller.start_recording();
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    controller.cleanup();
    pump.drain();
    Ok(())
}
