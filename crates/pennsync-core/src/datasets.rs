// Dataset listing helpers: collection filter and name selection.

use crate::model::Dataset;

/// Datasets whose name contains `filter` (case-insensitive), sorted by name.
pub fn filter_datasets(mut datasets: Vec<Dataset>, filter: Option<&str>) -> Vec<Dataset> {
    if let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        let needle = needle.to_lowercase();
        datasets.retain(|d| d.name.to_lowercase().contains(&needle));
    }
    datasets.sort_by(|a, b| a.name.cmp(&b.name));
    datasets
}

/// Split a comma-separated `--dataset` value into trimmed, non-empty names.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Result of matching requested names against the remote listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Matched datasets, in request order.
    pub found: Vec<Dataset>,
    /// Requested names with no remote dataset.
    pub missing: Vec<String>,
}

/// Pick the datasets named in `names` (exact match, duplicates collapsed).
pub fn select_by_name(available: &[Dataset], names: &[String]) -> Selection {
    let mut selection = Selection::default();
    for name in names {
        if selection.found.iter().any(|d| &d.name == name) {
            continue;
        }
        match available.iter().find(|d| &d.name == name) {
            Some(dataset) => selection.found.push(dataset.clone()),
            None => selection.missing.push(name.clone()),
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ds(name: &str) -> Dataset {
        Dataset {
            id: format!("N:dataset:{name}"),
            name: name.into(),
        }
    }

    #[test]
    fn filter_is_case_insensitive_and_sorted() {
        let all = vec![ds("PennEPI00143"), ds("EPS0000002"), ds("PennEPI00049"), ds("other")];
        let names: Vec<String> = filter_datasets(all, Some("pennepi"))
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["PennEPI00049", "PennEPI00143"]);
    }

    #[test]
    fn no_filter_keeps_everything() {
        let all = vec![ds("b"), ds("a")];
        assert_eq!(filter_datasets(all, Some("  ")).len(), 2);
    }

    #[test]
    fn name_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_name_list(" PennEPI00049, PennEPI00143 ,,"),
            ["PennEPI00049", "PennEPI00143"]
        );
        assert!(parse_name_list(" , ").is_empty());
    }

    #[test]
    fn selection_reports_missing_names() {
        let available = [ds("A"), ds("B"), ds("C")];
        let names = parse_name_list("C,X,A,C");
        let selection = select_by_name(&available, &names);
        assert_eq!(selection.found, [ds("C"), ds("A")]);
        assert_eq!(selection.missing, ["X"]);
    }
}
