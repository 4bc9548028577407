mod compile;
mod parse;
mod pipeline;
mod types;

pub use compile::build_filter;
pub use parse::{FilterSerde, parse_filter_json};
pub use pipeline::{
    pipe_group, pipe_limit, pipe_lookup, pipe_match, pipe_project, pipe_skip, pipe_sort,
    pipe_sort_multiple, pipe_switch, pipe_unwind,
};
pub use types::{
    DeleteReport, Filter, Operand, Operator, Order, SortSpec, SwitchCase, SwitchParams,
    UpdateReport,
};
