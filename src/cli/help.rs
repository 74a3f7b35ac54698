use crate::functions::FunctionRegistry;

/// Map the `-v` count to a tracing filter directive
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        2 => "mapshuffle=trace,info",
        _ => "trace", // -vvv shows everything including dependencies
    }
}

/// Human-readable listing of the registered functions
pub fn format_function_list(registry: &FunctionRegistry) -> String {
    let mut out = String::from("Mappers:\n");
    for name in registry.mapper_names() {
        out.push_str("  ");
        out.push_str(name);
        out.push('\n');
    }
    out.push_str("Reducers:\n");
    for name in registry.reducer_names() {
        out.push_str("  ");
        out.push_str(name);
        out.push('\n');
    }
    out
}
