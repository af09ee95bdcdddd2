//! End-to-end signal construction.
//!
//! Stages run strictly in order and each consumes only the previous stage's
//! output: load, join, panel, winsorize, regress, expand. Row- and
//! group-level problems are counted in [`PipelineStats`] and never abort the
//! run.

use crate::config::PipelineConfig;
use crate::error::Result;
use accruals_data::{
    AccountingRecord, JoinStats, MasterRecord, dedup_accounting, join_master, read_accounting_file,
    read_master_file,
};
use accruals_output::{ReportBuilder, ReportError, SignalRecord};
use accruals_signal::{
    ExpandStats, MonthlySignal, PanelStats, RegressionStats, WinsorStats, build_panel,
    drop_early_exchange, finalize, regress_groups, winsorize_by_year,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Pipeline stage, reported to progress observers before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Reading and deduplicating the inputs
    Load,
    /// Attaching exchange codes
    Join,
    /// Lags, ratios and industry buckets
    Panel,
    /// Within-year tail treatment
    Winsorize,
    /// Industry-year regressions
    Regress,
    /// Monthly expansion and collapse
    Expand,
}

impl Stage {
    /// Stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::Load,
        Self::Join,
        Self::Panel,
        Self::Winsorize,
        Self::Regress,
        Self::Expand,
    ];

    /// Lower-case stage name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Join => "join",
            Self::Panel => "panel",
            Self::Winsorize => "winsorize",
            Self::Regress => "regress",
            Self::Expand => "expand",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts from the load stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Accounting rows read
    pub accounting_rows: usize,
    /// Accounting rows removed as duplicate (gvkey, fyear)
    pub duplicate_firm_years: usize,
    /// Master rows read
    pub master_rows: usize,
}

/// Statistics of every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Input counts
    pub load: LoadStats,
    /// Join counts
    pub join: JoinStats,
    /// Panel counts
    pub panel: PanelStats,
    /// Winsorization counts
    pub winsorize: WinsorStats,
    /// Regression counts
    pub regress: RegressionStats,
    /// Expansion counts
    pub expand: ExpandStats,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One row per (permno, month), sorted by permno then month
    pub rows: Vec<MonthlySignal>,
    /// Stage statistics
    pub stats: PipelineStats,
}

/// Export form of one monthly row.
pub fn to_record(row: &MonthlySignal) -> SignalRecord {
    SignalRecord {
        permno: row.permno.into(),
        yyyymm: row.yyyymm(),
        gvkey: row.gvkey.into(),
        fyear: row.fyear,
        datadate: row.datadate,
        abnormal_accruals: row.abnormal_accruals,
        abnormal_accruals_percent: row.abnormal_accruals_percent,
    }
}

impl PipelineOutput {
    /// Rows in export form.
    pub fn records(&self) -> Vec<SignalRecord> {
        self.rows.iter().map(to_record).collect()
    }

    /// Report builder preloaded with the configuration and stage statistics.
    pub fn report(
        &self,
        config: &PipelineConfig,
    ) -> std::result::Result<ReportBuilder, ReportError> {
        let s = &self.stats;
        ReportBuilder::new()
            .version(crate::VERSION)
            .config(config)?
            .stage(Stage::Load.name(), &s.load)?
            .stage(Stage::Join.name(), &s.join)?
            .stage(Stage::Panel.name(), &s.panel)?
            .stage(Stage::Winsorize.name(), &s.winsorize)?
            .stage(Stage::Regress.name(), &s.regress)?
            .stage(Stage::Expand.name(), &s.expand)
    }
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The effective configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage after loading over in-memory inputs.
    pub fn run(
        &self,
        accounting: Vec<AccountingRecord>,
        master: &[MasterRecord],
    ) -> PipelineOutput {
        self.run_with(accounting, master, |_| {})
    }

    /// Like [`Self::run`], calling `on_stage` before each stage starts.
    pub fn run_with<F>(
        &self,
        accounting: Vec<AccountingRecord>,
        master: &[MasterRecord],
        mut on_stage: F,
    ) -> PipelineOutput
    where
        F: FnMut(Stage),
    {
        let signal = &self.config.signal;
        let mut stats = PipelineStats::default();

        stats.load.accounting_rows = accounting.len();
        stats.load.master_rows = master.len();
        let (accounting, duplicates) = dedup_accounting(accounting);
        stats.load.duplicate_firm_years = duplicates;

        on_stage(Stage::Join);
        let (joined, join_stats) = join_master(accounting, master);
        stats.join = join_stats;

        on_stage(Stage::Panel);
        let (panel, panel_stats) = build_panel(joined);
        stats.panel = panel_stats;

        on_stage(Stage::Winsorize);
        let (panel, winsor_stats) =
            winsorize_by_year(panel, signal.winsor_buckets, signal.winsor_mode);
        stats.winsorize = winsor_stats;

        on_stage(Stage::Regress);
        let (residuals, mut regress_stats) = regress_groups(panel, signal.min_group_size);
        let (residuals, dropped) =
            drop_early_exchange(residuals, signal.nasdaq_exchcd, signal.nasdaq_first_year);
        regress_stats.nasdaq_dropped = dropped;
        stats.regress = regress_stats;

        on_stage(Stage::Expand);
        let (rows, expand_stats) = finalize(residuals, signal.expansion_months);
        stats.expand = expand_stats;

        info!(
            accounting = stats.load.accounting_rows,
            joined = stats.join.joined,
            panel = stats.panel.panel_rows,
            groups = stats.regress.fitted,
            output = rows.len(),
            "abnormal accruals pipeline finished"
        );
        PipelineOutput { rows, stats }
    }

    /// Load both inputs from disk and run every stage.
    ///
    /// # Errors
    /// Any fatal input error: unreadable file, missing column, unparseable
    /// cell.
    pub fn run_files<F>(
        &self,
        accounting: &Path,
        master: &Path,
        mut on_stage: F,
    ) -> Result<PipelineOutput>
    where
        F: FnMut(Stage),
    {
        let options = self.config.csv_options()?;

        on_stage(Stage::Load);
        let accounting = read_accounting_file(accounting, &options)?;
        let master = read_master_file(master, &options)?;

        Ok(self.run_with(accounting, &master, on_stage))
    }
}
