//! Small string helpers shared by the loader, filters and store.

/// Append `.csv` to a file name that does not already end with it.
pub fn with_csv_extension(name: &str) -> String {
    if name.ends_with(".csv") {
        name.to_string()
    } else {
        format!("{name}.csv")
    }
}

/// Upper-case the first character and lower-case the rest.
///
/// Region and month names are canonicalized this way, so `"emilia-Romagna"`
/// becomes `"Emilia-romagna"`, matching how the dataset is normalized on load.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
