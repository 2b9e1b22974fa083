//! `cineline harvest` - run a single harvest stage

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};

use cineline_core::{ResumePolicy, SharedProgress, fmt_num};

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct HarvestArgs {
    #[command(subcommand)]
    pub stage: HarvestStage,
}

#[derive(Subcommand, Debug)]
pub enum HarvestStage {
    /// Build the movie catalog year by year
    Discover(DiscoverArgs),
    /// Fetch details and credits for every cataloged movie
    Details(ResumableArgs),
    /// Fetch person records for top-billed cast
    People(ResumableArgs),
    /// Refresh the genre, country and language reference tables
    Seeds,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// First release year to cover
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last release year to cover
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Keep only movies with at least this many votes
    #[arg(long)]
    pub vote_count_gte: Option<u32>,

    /// Rows per sink write
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ResumableArgs {
    /// Ids per fetch round and rows per sink write
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Discard the sink and fetch every candidate again
    #[arg(long)]
    pub fresh: bool,
}

pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let mut harvest = config.harvest_config()?;

    let interrupted = match args.stage {
        HarvestStage::Discover(stage_args) => {
            if let Some(year) = stage_args.start_year {
                harvest.discover.start_year = year;
            }
            if let Some(year) = stage_args.end_year {
                harvest.discover.end_year = year;
            }
            if let Some(votes) = stage_args.vote_count_gte {
                harvest.discover.vote_count_gte = votes;
            }
            if let Some(size) = stage_args.batch_size {
                harvest.batch_size = size;
            }
            harvest.validate()?;

            let summary = cineline_tmdb::discover::run(&harvest, progress.clone())?;
            print_summary(
                "Discover",
                vec![
                    (
                        "Years".into(),
                        format!(
                            "{}/{} done, {} failed, {} empty",
                            summary.years_done,
                            summary.years_total,
                            summary.years_failed,
                            summary.years_empty
                        ),
                    ),
                    ("Movies written".into(), fmt_num(summary.rows_written)),
                    (
                        "Time".into(),
                        format!("{:.1}s", summary.elapsed.as_secs_f64()),
                    ),
                ],
            );
            summary.interrupted
        }
        HarvestStage::Details(stage_args) => {
            apply_resumable(&mut harvest, &stage_args);
            harvest.validate()?;

            let summary = cineline_tmdb::details::run(&harvest, progress.clone())?;
            print_summary(
                "Details",
                vec![
                    ("Candidates".into(), fmt_num(summary.candidates)),
                    ("Already on disk".into(), fmt_num(summary.already_present)),
                    (
                        "Fetched".into(),
                        format!(
                            "{}/{} ({} gone, {} failed)",
                            fmt_num(summary.fetched),
                            fmt_num(summary.planned),
                            summary.empty,
                            summary.failed
                        ),
                    ),
                    ("Credits rows".into(), fmt_num(summary.credits_rows)),
                    (
                        "Time".into(),
                        format!("{:.1}s", summary.elapsed.as_secs_f64()),
                    ),
                ],
            );
            summary.interrupted
        }
        HarvestStage::People(stage_args) => {
            apply_resumable(&mut harvest, &stage_args);
            harvest.validate()?;

            let summary = cineline_tmdb::people::run(&harvest, progress.clone())?;
            print_summary(
                "People",
                vec![
                    (
                        "Candidates".into(),
                        format!(
                            "{} unique ({} mined)",
                            fmt_num(summary.candidates),
                            fmt_num(summary.mined)
                        ),
                    ),
                    ("Already on disk".into(), fmt_num(summary.already_present)),
                    (
                        "Fetched".into(),
                        format!(
                            "{}/{} ({} gone, {} failed)",
                            fmt_num(summary.fetched),
                            fmt_num(summary.planned),
                            summary.empty,
                            summary.failed
                        ),
                    ),
                    (
                        "Time".into(),
                        format!("{:.1}s", summary.elapsed.as_secs_f64()),
                    ),
                ],
            );
            summary.interrupted
        }
        HarvestStage::Seeds => {
            harvest.validate()?;

            let summary = cineline_tmdb::seeds::run(&harvest, progress.clone())?;
            print_summary(
                "Seeds",
                vec![
                    ("Genres".into(), fmt_num(summary.genres_rows)),
                    ("Countries".into(), fmt_num(summary.countries_rows)),
                    ("Languages".into(), fmt_num(summary.languages_rows)),
                    (
                        "Time".into(),
                        format!("{:.1}s", summary.elapsed.as_secs_f64()),
                    ),
                ],
            );
            summary.interrupted
        }
    };

    if interrupted {
        log::warn!("Interrupted; rerun the same command to pick up where it left off");
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn apply_resumable(harvest: &mut cineline_tmdb::HarvestConfig, args: &ResumableArgs) {
    if let Some(size) = args.batch_size {
        harvest.batch_size = size;
    }
    if args.fresh {
        harvest.resume = ResumePolicy::Fresh;
    }
}
