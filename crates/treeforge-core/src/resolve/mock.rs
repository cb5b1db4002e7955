use super::{ResolveError, Resolver};
use std::collections::BTreeSet;
use treeforge_schema::{Checksum, PackageSet, PackageSpec, PipelineName};

/// Deterministic resolver for tests and dry runs.
///
/// Every included package resolves to version `0.0.0-mock`, with a checksum
/// derived from its name. A package already provided by an earlier set of the
/// chain is not repeated.
#[derive(Debug, Default)]
pub struct MockResolver;

impl MockResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    fn resolve(
        &self,
        _pipeline: &PipelineName,
        chain: &[PackageSet],
    ) -> Result<Vec<Vec<PackageSpec>>, ResolveError> {
        let mut seen = BTreeSet::new();
        let resolved: Vec<Vec<PackageSpec>> = chain
            .iter()
            .map(|set| {
                let repo = set.repositories.first().map_or("mock", String::as_str);
                set.include
                    .iter()
                    .filter(|name| !set.exclude.contains(*name))
                    .filter(|name| seen.insert((*name).clone()))
                    .map(|name| mock_spec(name, repo))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(resolved)
    }
}

fn mock_spec(name: &str, repo: &str) -> PackageSpec {
    let digest = blake3::hash(format!("mock-package:{name}").as_bytes())
        .to_hex()
        .to_string();
    PackageSpec {
        name: name.to_owned(),
        epoch: 0,
        version: "0.0.0".to_owned(),
        release: "mock".to_owned(),
        arch: "noarch".to_owned(),
        remote_location: format!("https://mock.invalid/{repo}/{name}-0.0.0-mock.noarch.rpm"),
        checksum: Checksum::new(format!("blake3:{digest}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(include: &[&str]) -> PackageSet {
        PackageSet::new(
            include.iter().map(|s| (*s).to_owned()).collect(),
            vec!["fedora".to_owned()],
        )
    }

    #[test]
    fn one_result_per_set() {
        let resolver = MockResolver::new();
        let sets = resolver
            .resolve(&PipelineName::new("os"), &[set(&["bash"]), set(&["vim"])])
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0][0].nevra(), "bash-0.0.0-mock.noarch");
        assert_eq!(sets[1][0].name, "vim");
        assert!(sets[1][0].remote_location.contains("/fedora/"));
    }

    #[test]
    fn later_sets_do_not_repeat_packages() {
        let resolver = MockResolver::new();
        let sets = resolver
            .resolve(
                &PipelineName::new("os"),
                &[set(&["bash", "glibc"]), set(&["glibc", "vim"])],
            )
            .unwrap();
        let second: Vec<_> = sets[1].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(second, vec!["vim"]);
    }

    #[test]
    fn excluded_packages_are_dropped() {
        let resolver = MockResolver::new();
        let chain = [set(&["bash", "rescue"]).with_exclude(vec!["rescue".to_owned()])];
        let sets = resolver.resolve(&PipelineName::new("os"), &chain).unwrap();
        assert_eq!(sets[0].len(), 1);
    }

    #[test]
    fn checksums_are_deterministic() {
        let resolver = MockResolver::new();
        let a = resolver
            .resolve(&PipelineName::new("a"), &[set(&["bash"])])
            .unwrap();
        let b = resolver
            .resolve(&PipelineName::new("b"), &[set(&["bash"])])
            .unwrap();
        assert_eq!(a[0][0].checksum, b[0][0].checksum);
    }
}
