//! Ready-made pipelines for the usual entry points.

use tidypipe_core::RunnerSettings;

use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::{
    AnalysisStage, CommandStage, FilterStage, HtmlReportStage, LimitsStage, NormalizeStage,
    StripColorStage,
};

fn base(settings: &RunnerSettings) -> PipelineBuilder {
    Pipeline::builder()
        .dirs(settings.dirs.iter().cloned())
        .output_root(settings.output_path.clone())
        .log_dir(settings.log_path.clone())
}

fn analysis_prefix(settings: &RunnerSettings) -> PipelineBuilder {
    base(settings)
        .stage(CommandStage::reconfigure(&settings.build_dir))
        .stage(
            FilterStage::new(settings.build_dir.clone(), settings.filter.clone())
                .with_arch_include(settings.arch_include.clone()),
        )
        .stage(AnalysisStage::from_settings(settings))
        .stage(StripColorStage::new())
}

/// Reconfigure, filter, analyse, strip colour.
pub fn clang_check(settings: &RunnerSettings) -> Pipeline {
    analysis_prefix(settings).build()
}

/// [`clang_check`] followed by the limit check and path normalization.
pub fn clang_tidy(settings: &RunnerSettings) -> Pipeline {
    analysis_prefix(settings)
        .stage(LimitsStage::from_settings(settings))
        .stage(NormalizeStage::new(settings.base_dir.clone()))
        .build()
}

/// Render an HTML report from an existing `warnings.txt`.
pub fn html_report(settings: &RunnerSettings) -> Pipeline {
    base(settings)
        .stage(HtmlReportStage::from_settings(settings))
        .build()
}
