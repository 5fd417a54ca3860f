use tracing_subscriber::EnvFilter;

/// Maps the `DEBUG` contract onto tracing targets: `ovai` covers the
/// gateway itself, `ovai:srv` the request log, `ovai:net` the upstream
/// wire, `ovai*` everything.
pub(crate) fn init() {
    let mut filter = EnvFilter::new("info");
    let config = std::env::var("DEBUG").unwrap_or_default();
    for token in config.split(',') {
        let directives: &[&str] = match token.trim().to_ascii_lowercase().as_str() {
            "ovai" => &["ovai=debug"],
            "ovai:srv" => &["ovai_srv=debug"],
            "ovai:net" => &["ovai_net=debug"],
            "ovai:*" => &["ovai_srv=debug", "ovai_net=debug"],
            "ovai*" => &["ovai=debug", "ovai_srv=debug", "ovai_net=debug"],
            _ => &[],
        };
        for directive in directives {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
