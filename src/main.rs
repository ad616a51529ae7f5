use paint_prompter::calibration::acquire::{
    calibrate_canvas, calibrate_tools, CanvasCalibrationSummary, DisplayCapture,
    ImageMatchAcquirer, ManualAcquirer,
};
use paint_prompter::calibration::CalibrationStore;
use paint_prompter::host::PaintHost;
use paint_prompter::input::SendInputDriver;
use paint_prompter::llm::{load_system_prompt, GeminiClient};
use paint_prompter::menu::{test_shapes, MenuChoice, Session, MENU};
use paint_prompter::settings::{Settings, SETTINGS_FILE};
use paint_prompter::voice::CommandTranscriber;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::load(SETTINGS_FILE)?;
    paint_prompter::logging::init(
        settings.debug_logging,
        settings.log_file.as_ref().map(PathBuf::from),
    );

    if !cfg!(target_os = "windows") {
        tracing::error!("this tool drives Microsoft Paint and only works on Windows");
        anyhow::bail!("unsupported platform");
    }

    let store = CalibrationStore::new(&settings.calibration_file);
    let mut driver = SendInputDriver::new();
    let mut host = PaintHost::new(settings.host.clone());
    let stdin = io::stdin();
    let mut out = io::stdout();

    loop {
        writeln!(out, "\n{MENU}")?;
        let Some(line) = prompt(&mut out, "\nEnter your choice (1-7): ")? else {
            break;
        };
        let Some(choice) = MenuChoice::parse(&line) else {
            writeln!(out, "Unknown choice '{}'", line.trim())?;
            continue;
        };

        match choice {
            MenuChoice::CalibrateTools => {
                let mut acquirer = ManualAcquirer::new(stdin.lock(), io::stdout(), &driver);
                let summary = calibrate_tools(&mut acquirer, &store)?;
                if summary.saved {
                    writeln!(
                        out,
                        "\nCalibration saved to '{}' ({} recorded, {} skipped)",
                        store.path().display(),
                        summary.recorded.len(),
                        summary.missed.len()
                    )?;
                } else {
                    writeln!(out, "\nNo tools recorded; existing calibration kept")?;
                }
            }
            MenuChoice::CalibrateCanvas => {
                let mut acquirer = ManualAcquirer::new(stdin.lock(), io::stdout(), &driver);
                let summary = calibrate_canvas(&mut acquirer, &store)?;
                report_canvas(&mut out, &store, &summary)?;
            }
            MenuChoice::AutoCalibrate => {
                let mut screen = DisplayCapture;
                let mut acquirer = ImageMatchAcquirer::new(
                    &mut screen,
                    &mut driver,
                    Path::new(&settings.matching.templates_dir),
                    settings.matching.confidence,
                );
                let summary = calibrate_tools(&mut acquirer, &store)?;
                writeln!(
                    out,
                    "\nTools: {} found, failed: {:?}",
                    summary.recorded.len(),
                    summary.missed
                )?;
                let canvas = calibrate_canvas(&mut acquirer, &store)?;
                report_canvas(&mut out, &store, &canvas)?;
            }
            MenuChoice::DrawTestShapes => {
                writeln!(out, "\nThis will open Paint and draw shapes.")?;
                if prompt(&mut out, "Press Enter to continue...")?.is_none() {
                    break;
                }
                session(&store, &mut driver, &mut host, &settings).draw(&test_shapes(), &mut out)?;
            }
            MenuChoice::DrawFromPrompt => {
                let Some(query) = prompt(&mut out, "Enter prompt to draw in Paint: ")? else {
                    break;
                };
                let Some(generator) = model_client(&settings, &mut out)? else {
                    continue;
                };
                session(&store, &mut driver, &mut host, &settings).draw_from_prompt(
                    &query,
                    &generator,
                    &mut out,
                )?;
            }
            MenuChoice::DrawFromVoice => {
                let Some(command) = settings.voice.command.as_deref() else {
                    writeln!(
                        out,
                        "No speech recognizer configured; set voice.command in {SETTINGS_FILE}"
                    )?;
                    continue;
                };
                let mut transcriber = CommandTranscriber::new(command)?;
                let Some(generator) = model_client(&settings, &mut out)? else {
                    continue;
                };
                session(&store, &mut driver, &mut host, &settings).draw_from_voice(
                    &mut transcriber,
                    settings.voice.timeout(),
                    settings.voice.phrase_limit(),
                    &generator,
                    &mut out,
                )?;
            }
            MenuChoice::Exit => break,
        }
    }
    Ok(())
}

fn report_canvas(
    out: &mut impl Write,
    store: &CalibrationStore,
    summary: &CanvasCalibrationSummary,
) -> io::Result<()> {
    if summary.canvas.is_some() {
        return writeln!(
            out,
            "\nCanvas calibration saved to '{}'",
            store.path().display()
        );
    }
    writeln!(out, "\nCanvas calibration incomplete; nothing saved")?;
    for (corner, error) in &summary.missed {
        match error {
            Some(e) => writeln!(out, "  {corner}: {e}")?,
            None => writeln!(out, "  {corner}: not found")?,
        }
    }
    Ok(())
}

fn session<'a>(
    store: &'a CalibrationStore,
    driver: &'a mut SendInputDriver,
    host: &'a mut PaintHost,
    settings: &Settings,
) -> Session<'a> {
    Session {
        store,
        driver,
        host,
        timings: settings.drawing.clone(),
    }
}

fn model_client(settings: &Settings, out: &mut impl Write) -> anyhow::Result<Option<GeminiClient>> {
    let system_prompt = load_system_prompt(settings.system_prompt_path.as_deref().map(Path::new));
    match GeminiClient::from_env(&settings.model, system_prompt) {
        Ok(client) => Ok(Some(client)),
        Err(e) => {
            tracing::error!("cannot create model client: {e}");
            writeln!(out, "Model unavailable: {e}")?;
            Ok(None)
        }
    }
}

/// Print `message` and read one line; `None` on end of input.
fn prompt(out: &mut impl Write, message: &str) -> anyhow::Result<Option<String>> {
    write!(out, "{message}")?;
    out.flush()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then_some(line))
}
