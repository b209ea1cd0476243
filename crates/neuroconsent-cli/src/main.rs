//! Command-line front end for the neuro-consent decision engine.
//! Reads scenario and baseline JSON files and prints decisions as JSON.

mod scenario;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bioload_guards::{BandClassifier, BandInputs};
use clap::{Arg, ArgAction, ArgMatches, Command};
use neuroconsent_core::{
    BioloadBand, ConsentDecision, ConsentRequest, EngineConfig, HostBiophysicalProfile,
    StakeholderThreshold, SubjectSelfConsent, TelemetryProvider,
};
use neuroconsent_engine::{
    BoundedAuditLog, FanoutSink, InferenceGate, InferenceGateDecision, InferenceRequest,
    NeuroConsentEngine,
};
use prometheus_bridge::DecisionMetrics;
use serde_json::json;
use threshold_calibration::ThresholdCalibrator;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scenario::{load_baseline, load_json, load_scenario, JsonFileTelemetry, Scenario};

/// Exit status when the decision is a Halt or inference is not permitted.
const EXIT_HALT: u8 = 2;

fn cli() -> Command {
    let scenario = Arg::new("scenario")
        .long("scenario")
        .required(true)
        .value_name("PATH")
        .help("Scenario JSON (profile, baseline, actor, rights, jurisdiction, operation)");
    let config = Arg::new("config")
        .long("config")
        .global(true)
        .value_name("PATH")
        .help("Engine configuration JSON");

    Command::new("neuroconsent")
        .about("Neuro-consent decision engine: bioload bands, risk scoring and tiered authorization")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .arg(config)
        .subcommand(
            Command::new("decide")
                .about("Run the composite decision pipeline for one scenario")
                .arg(scenario.clone())
                .arg(
                    Arg::new("telemetry")
                        .long("telemetry")
                        .value_name("PATH")
                        .help("Snapshot JSON overriding the scenario's inline snapshot"),
                )
                .arg(
                    Arg::new("metrics")
                        .long("metrics")
                        .action(ArgAction::SetTrue)
                        .help("Print Prometheus exposition to stderr after deciding"),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Print the bioload band for a scenario's snapshot")
                .arg(scenario.clone()),
        )
        .subcommand(
            Command::new("calibrate")
                .about("Derive thresholds from a subject-provided baseline")
                .arg(
                    Arg::new("baseline")
                        .long("baseline")
                        .required(true)
                        .value_name("PATH")
                        .help("JSON object of marker -> baseline value"),
                )
                .arg(
                    Arg::new("subject")
                        .long("subject")
                        .required(true)
                        .value_name("ID")
                        .help("Subject running the calibration"),
                ),
        )
        .subcommand(
            Command::new("adjust")
                .about("Replace one threshold of the scenario's profile within the absolute envelope")
                .arg(scenario.clone())
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .required(true)
                        .value_name("PATH")
                        .help("Proposed stakeholder threshold JSON"),
                ),
        )
        .subcommand(
            Command::new("gate")
                .about("Check whether an on-device model may run under the scenario's bioload band")
                .arg(scenario)
                .arg(
                    Arg::new("model")
                        .long("model")
                        .required(true)
                        .value_name("NAME")
                        .help("Model name as registered in the inference policies"),
                )
                .arg(
                    Arg::new("purpose")
                        .long("purpose")
                        .required(true)
                        .value_name("PURPOSE")
                        .help("Declared purpose, e.g. CARE"),
                )
                .arg(
                    Arg::new("consented")
                        .long("consented")
                        .action(ArgAction::SetTrue)
                        .help("The subject has explicitly consented to this inference"),
                ),
        )
}

fn init_logging(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::load_from_json(path).with_context(|| format!("loading config {path}")),
        None => Ok(EngineConfig::default()),
    }
}

fn path_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a Path {
    // Every caller names an argument declared `required(true)`.
    Path::new(matches.get_one::<String>(name).map(String::as_str).unwrap_or_default())
}

fn run_decide(matches: &ArgMatches, config: &EngineConfig) -> Result<ExitCode> {
    let scenario = load_scenario(path_arg(matches, "scenario"))?;
    let snapshot = match matches.get_one::<String>("telemetry") {
        Some(path) => JsonFileTelemetry::new(path).current_snapshot(),
        None => scenario.snapshot.clone(),
    }
    .context("no telemetry snapshot available")?;

    let log = Arc::new(BoundedAuditLog::new(config.audit_capacity, config.audit_recent_entries));
    let metrics = Arc::new(DecisionMetrics::new()?);
    let sink = FanoutSink::new().with(log.clone()).with(metrics.clone());
    let engine = NeuroConsentEngine::new(Arc::new(sink));

    let outcome = engine.decide(&scenario.request(&snapshot));
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    info!(retained = log.len(), "decision recorded");

    if matches.get_flag("metrics") {
        eprint!("{}", metrics.render()?);
    }
    Ok(if outcome.decision.is_halt() {
        ExitCode::from(EXIT_HALT)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_classify(matches: &ArgMatches) -> Result<ExitCode> {
    let scenario = load_scenario(path_arg(matches, "scenario"))?;
    let snapshot = scenario
        .snapshot
        .as_ref()
        .context("scenario has no inline snapshot")?;
    let band = BandClassifier.classify(snapshot, &scenario.baseline);
    let inputs = BandInputs::derive(snapshot, &scenario.baseline);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "subject": snapshot.subject,
            "bioload_band": band,
            "inputs": inputs,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn run_calibrate(matches: &ArgMatches) -> Result<ExitCode> {
    let baseline = load_baseline(path_arg(matches, "baseline"))?;
    let subject = matches
        .get_one::<String>("subject")
        .context("--subject is required")?;
    // Running the command is the subject's own consent.
    let calibrator = ThresholdCalibrator::new(SubjectSelfConsent);
    let thresholds = calibrator.calibrate_baseline_thresholds(subject, &baseline)?;
    println!("{}", serde_json::to_string_pretty(&thresholds)?);
    Ok(ExitCode::SUCCESS)
}

/// Successor of `profile` with `proposed` applied under the configured
/// absolute envelope, consented by the subject running the command.
fn adjust_profile(
    profile: &HostBiophysicalProfile,
    proposed: StakeholderThreshold,
    config: &EngineConfig,
) -> Result<HostBiophysicalProfile> {
    let calibrator = ThresholdCalibrator::with_envelope(SubjectSelfConsent, config.absolute_envelope.clone());
    let marker = proposed.stakeholder.clone();
    calibrator
        .host_adjust_threshold(profile, proposed)
        .with_context(|| format!("adjusting {marker} for {}", profile.subject_id()))
}

fn run_adjust(matches: &ArgMatches, config: &EngineConfig) -> Result<ExitCode> {
    let scenario = load_scenario(path_arg(matches, "scenario"))?;
    let proposed: StakeholderThreshold = load_json(path_arg(matches, "threshold"))?;
    let next = adjust_profile(&scenario.profile, proposed, config)?;
    println!("{}", serde_json::to_string_pretty(&next)?);
    Ok(ExitCode::SUCCESS)
}

/// Bioload band of the scenario's snapshot and the gate's verdict for
/// `model` under the configured inference policies.
fn gate_decision(
    scenario: &Scenario,
    config: &EngineConfig,
    model: &str,
    purpose: &str,
    consented: bool,
) -> Result<(BioloadBand, InferenceGateDecision)> {
    let snapshot = scenario
        .snapshot
        .as_ref()
        .context("scenario has no inline snapshot")?;
    let band = BandClassifier.classify(snapshot, &scenario.baseline);
    let consent = move |_: &ConsentRequest| {
        if consented {
            ConsentDecision::Allowed
        } else {
            ConsentDecision::RequiresPanel {
                reason: "explicit subject consent not recorded".to_string(),
            }
        }
    };
    let request = InferenceRequest {
        model_name: model.to_string(),
        subject: scenario.profile.subject_id().to_string(),
        purpose: purpose.to_string(),
    };
    let decision = InferenceGate::from_config(config).check(&request, band, &consent);
    Ok((band, decision))
}

fn run_gate(matches: &ArgMatches, config: &EngineConfig) -> Result<ExitCode> {
    let scenario = load_scenario(path_arg(matches, "scenario"))?;
    let model = matches.get_one::<String>("model").context("--model is required")?;
    let purpose = matches.get_one::<String>("purpose").context("--purpose is required")?;
    let (band, decision) = gate_decision(&scenario, config, model, purpose, matches.get_flag("consented"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "model": model,
            "bioload_band": band,
            "gate": decision,
        }))?
    );
    Ok(if decision.is_permitted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_HALT)
    })
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("json-logs"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("decide", sub)) => run_decide(sub, &config),
        Some(("classify", sub)) => run_classify(sub),
        Some(("calibrate", sub)) => run_calibrate(sub),
        Some(("adjust", sub)) => run_adjust(sub, &config),
        Some(("gate", sub)) => run_gate(sub, &config),
        _ => unreachable!("subcommand_required"),
    }
}
