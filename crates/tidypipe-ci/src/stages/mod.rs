//! Concrete pipeline stages.
//!
//! | stage              | reads                    | writes                   |
//! |--------------------|--------------------------|--------------------------|
//! | `CommandStage`     | -                        | whatever the command does |
//! | `FilterStage`      | compile database, cache  | compile database         |
//! | `AnalysisStage`    | compile database         | `warnings.txt`           |
//! | `StripColorStage`  | `warnings.txt`           | `warnings.txt`           |
//! | `LimitsStage`      | `warnings.txt`           | -                        |
//! | `NormalizeStage`   | `warnings.txt`           | `warnings.txt`           |
//! | `HtmlReportStage`  | `warnings.txt`           | `report.json`, `html_report/` |

pub mod analysis;
pub mod color;
pub mod command;
pub mod filter;
pub mod limits;
pub mod normalize;
pub mod report;

pub use analysis::AnalysisStage;
pub use color::StripColorStage;
pub use command::{CommandStage, WorkDir};
pub use filter::FilterStage;
pub use limits::LimitsStage;
pub use normalize::NormalizeStage;
pub use report::HtmlReportStage;
