use crate::infra::{load_engine, InMemorySessionRepository};
use award_assist::config::ScoringConfig;
use award_assist::error::AppError;
use award_assist::workflows::award::{
    parse_date, render_plain, AcknowledgingResponder, AwardTier, AwardWorkflowService,
    AwardeeInfo, CitationGenerator, ExportFormat, PlainTextExtractor, ScoringEngine,
    WorkflowError,
};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const SCRIPTED_TURNS: [&str; 3] = [
    "As officer in charge of Station Grand Haven I led 45 personnel through the 2024 search and rescue season.",
    "I directed 312 cases across the district, saving 27 lives and preventing $4.2 million in property loss.",
    "Despite severe weather and limited resources, I developed a new process for boat crew qualification that reduced training time by 35 percent, resulting in recognition at the national level.",
];

#[derive(Args, Debug, Default)]
pub(crate) struct AwardeeArgs {
    /// Awardee name as it should appear in the citation
    #[arg(long)]
    pub(crate) name: Option<String>,
    /// Rank or rate abbreviation (e.g. BM1, LCDR)
    #[arg(long)]
    pub(crate) rank: Option<String>,
    #[arg(long)]
    pub(crate) unit: Option<String>,
    #[arg(long)]
    pub(crate) position: Option<String>,
    /// First day of the award period (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Last day of the award period (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) end: Option<NaiveDate>,
    /// Request the Operational Distinguishing Device
    #[arg(long)]
    pub(crate) operational_device: bool,
}

impl AwardeeArgs {
    fn into_info(self) -> AwardeeInfo {
        AwardeeInfo {
            name: self.name.unwrap_or_default(),
            rank: self.rank.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            date_start: self.start,
            date_end: self.end,
            operational_device: self.operational_device,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Plain-text narrative of the accomplishments
    pub(crate) narrative: PathBuf,
    /// JSON scoring policy replacing the built-in table
    #[arg(long)]
    pub(crate) policy: Option<PathBuf>,
    /// Also draft the citation for the recommended award
    #[arg(long)]
    pub(crate) citation: bool,
    #[command(flatten)]
    pub(crate) awardee: AwardeeArgs,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum ExportChoice {
    #[default]
    Txt,
    Json,
}

impl From<ExportChoice> for ExportFormat {
    fn from(choice: ExportChoice) -> Self {
        match choice {
            ExportChoice::Txt => ExportFormat::Txt,
            ExportChoice::Json => ExportFormat::Json,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Narrative file to use instead of the scripted conversation; one chat turn per paragraph
    #[arg(long)]
    pub(crate) narrative: Option<PathBuf>,
    /// Finalize at this award instead of the recommendation
    #[arg(long)]
    pub(crate) award: Option<String>,
    /// Export format for the finished package
    #[arg(long, value_enum, default_value_t = ExportChoice::Txt)]
    pub(crate) export: ExportChoice,
    /// Write the export into this directory instead of printing it
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) awardee: AwardeeArgs,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        narrative,
        policy,
        citation,
        awardee,
    } = args;

    let engine = load_engine(&ScoringConfig {
        policy_path: policy,
    })?;
    let text = fs::read_to_string(&narrative)?;
    let awardee = awardee.into_info();
    awardee.validate().map_err(WorkflowError::from)?;

    let assessment = engine.score(&text, &awardee);
    println!("Narrative: {}", narrative.display());
    println!("Policy: {}", assessment.policy_version);
    println!(
        "Recommended award: {} ({})",
        assessment.tier.label(),
        assessment.tier.abbreviation()
    );
    println!(
        "Weighted score: {:.1}/100",
        assessment.scores.total_weighted()
    );
    for (criterion, score) in assessment.scores.iter() {
        println!("  {:<22} {score:>4.1}/10", criterion.label());
    }
    if !assessment.requirements_met && assessment.tier != AwardTier::NoAward {
        println!("Note: the narrative is light on what this award usually shows.");
    }

    if citation {
        print_citation(&engine, assessment.tier, &awardee, &text, assessment.operational_device);
    }
    Ok(())
}

fn print_citation(
    engine: &ScoringEngine,
    tier: AwardTier,
    awardee: &AwardeeInfo,
    narrative: &str,
    operational_device: bool,
) {
    let generator = CitationGenerator::default();
    match generator.generate(tier, awardee, narrative, operational_device) {
        Ok(citation) => {
            println!("\nCitation ({}):", engine.policy().version);
            println!("{}", render_plain(&citation));
            for issue in generator.audit(tier, &citation) {
                println!("  audit: {issue:?}");
            }
        }
        Err(err) => println!("\nNo citation drafted: {err}"),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        narrative,
        award,
        export,
        output,
        awardee,
    } = args;

    let turns: Vec<String> = match narrative {
        Some(path) => fs::read_to_string(path)?
            .split("\n\n")
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .map(str::to_string)
            .collect(),
        None => SCRIPTED_TURNS.iter().map(|turn| turn.to_string()).collect(),
    };
    let mut awardee = awardee.into_info();
    if awardee.name.is_empty() {
        awardee.name = "Dana Reyes".to_string();
        awardee.rank = "BM1".to_string();
        awardee.unit = "Station Grand Haven".to_string();
    }
    let award = match award.as_deref() {
        Some(label) => Some(AwardTier::from_label(label).ok_or_else(|| {
            WorkflowError::Validation(format!("unknown award '{label}'"))
        })?),
        None => None,
    };

    let service = AwardWorkflowService::new(
        Arc::new(InMemorySessionRepository::default()),
        Arc::new(AcknowledgingResponder),
        Arc::new(PlainTextExtractor),
        load_engine(&ScoringConfig::default())?,
    );

    println!("Award drafting demo");
    let session = service.current_session(None)?;
    println!("Session {}", session.id);

    for turn in &turns {
        let exchange = service.chat(&session.id, turn)?;
        println!("\n> {}", exchange.user.content);
        println!("{}", exchange.reply.content);
    }

    let recommendation = service.recommend(&session.id, Some(awardee))?;
    println!("\n{}", recommendation.explanation);

    let advice = service.improve(&session.id, None)?;
    if !advice.suggestions.is_empty() {
        println!("\nHow to strengthen the package:");
        for suggestion in &advice.suggestions {
            println!("  - {suggestion}");
        }
    }

    match service.finalize(&session.id, award, None) {
        Ok(finalized) => {
            println!("\nFinal award: {}", finalized.award.label());
            println!("{}", render_plain(&finalized.citation));
        }
        Err(err @ WorkflowError::State(_)) => {
            println!("\nNot finalized: {err}");
        }
        Err(err) => return Err(err.into()),
    }

    let document = service.export(&session.id, export.into(), None)?;
    match output {
        Some(directory) => {
            fs::create_dir_all(&directory)?;
            let path = directory.join(&document.filename);
            fs::write(&path, &document.content)?;
            println!("\nExported {} bytes to {}", document.size, path.display());
        }
        None => {
            println!("\n{}", document.content);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_writes_the_export_package() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = DemoArgs {
            output: Some(dir.path().to_path_buf()),
            export: ExportChoice::Json,
            ..DemoArgs::default()
        };
        run_demo(args).expect("demo runs");

        let written: Vec<_> = fs::read_dir(dir.path())
            .expect("output dir")
            .filter_map(Result::ok)
            .collect();
        assert_eq!(written.len(), 1);
        let name = written[0].file_name().to_string_lossy().into_owned();
        assert!(name.starts_with("award_package_Dana_Reyes_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn demo_rejects_unknown_awards() {
        let args = DemoArgs {
            award: Some("Medal of Honor".to_string()),
            ..DemoArgs::default()
        };
        assert!(matches!(run_demo(args), Err(AppError::Workflow(_))));
    }

    #[test]
    fn awardee_args_map_onto_the_form() {
        let info = AwardeeArgs {
            name: Some("Dana Reyes".to_string()),
            rank: Some("BM1".to_string()),
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..AwardeeArgs::default()
        }
        .into_info();
        assert_eq!(info.citation_name(), "BM1 DANA REYES");
        assert_eq!(info.date_end, None);
    }
}
