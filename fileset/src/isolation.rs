//! Test-case processors applied to submitted cases before they reach the store.

use std::collections::HashSet;

use crate::file_record::FileRecord;
use crate::test_case::TestCaseSpec;

/// A rewrite stage over a batch of submitted test cases.
pub trait TestCaseProcessor: Send + Sync {
    fn process(&self, cases: Vec<TestCaseSpec>) -> Vec<TestCaseSpec>;
}

/// Run `cases` through each processor in order.
pub fn run_processors(
    processors: &[Box<dyn TestCaseProcessor>],
    cases: Vec<TestCaseSpec>,
) -> Vec<TestCaseSpec> {
    processors
        .iter()
        .fold(cases, |cases, processor| processor.process(cases))
}

/// Puts each test file into its own test case so no global state leaks
/// between tests declared together.
///
/// Cases without tests contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolationProcessor;

impl TestCaseProcessor for IsolationProcessor {
    fn process(&self, cases: Vec<TestCaseSpec>) -> Vec<TestCaseSpec> {
        let isolated: Vec<TestCaseSpec> = cases
            .iter()
            .flat_map(|case| {
                case.tests.iter().map(|test| {
                    TestCaseSpec::new(
                        isolated_case_id(test.display_path()),
                        case.dependencies.clone(),
                        vec![test.clone()],
                        case.plugins.clone(),
                    )
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for case in &isolated {
            if !seen.insert(case.id.as_str()) {
                tracing::warn!(
                    case_id = %case.id,
                    test = %case.tests.first().map(FileRecord::display_path).unwrap_or_default(),
                    "isolated case id repeats in batch; the later case replaces the earlier one"
                );
            }
        }
        isolated
    }
}

/// Id of the singleton case generated for a test file.
pub fn isolated_case_id(display_path: &str) -> String {
    display_path.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(name: &str) -> FileRecord {
        FileRecord::placeholder(name, 0).with_content("", 0)
    }

    #[test]
    fn each_test_file_gets_its_own_case() {
        let deps_1 = vec![file("dep1")];
        let deps_2 = vec![file("dep2")];
        let plugins_1 = vec![file("plugin1")];
        let plugins_2 = vec![file("plugin2")];
        let two_tests = TestCaseSpec::new(
            "",
            deps_1.clone(),
            vec![file("test/one.js"), file("test/two.js")],
            plugins_1.clone(),
        );
        let one_test = TestCaseSpec::new(
            "",
            deps_2.clone(),
            vec![file("test3.js")],
            plugins_2.clone(),
        );

        let processed = IsolationProcessor.process(vec![two_tests, one_test]);

        assert_eq!(
            processed,
            vec![
                TestCaseSpec::new(
                    "test_one.js",
                    deps_1.clone(),
                    vec![file("test/one.js")],
                    plugins_1.clone()
                ),
                TestCaseSpec::new("test_two.js", deps_1, vec![file("test/two.js")], plugins_1),
                TestCaseSpec::new("test3.js", deps_2, vec![file("test3.js")], plugins_2),
            ]
        );
    }

    #[test]
    fn cases_without_tests_are_dropped() {
        let infra_only = TestCaseSpec::new("infra", vec![file("dep.js")], vec![], vec![]);
        assert!(IsolationProcessor.process(vec![infra_only]).is_empty());
    }

    #[test]
    fn windows_separators_are_replaced() {
        assert_eq!(isolated_case_id(r"spec\unit/a.js"), "spec_unit_a.js");
    }

    #[test]
    fn processors_run_in_order() {
        struct Rename;
        impl TestCaseProcessor for Rename {
            fn process(&self, cases: Vec<TestCaseSpec>) -> Vec<TestCaseSpec> {
                cases
                    .into_iter()
                    .map(|mut case| {
                        case.id = format!("renamed-{}", case.id);
                        case
                    })
                    .collect()
            }
        }

        let processors: Vec<Box<dyn TestCaseProcessor>> =
            vec![Box::new(IsolationProcessor), Box::new(Rename)];
        let case = TestCaseSpec::new("c", vec![], vec![file("a/b.js")], vec![]);

        let ids: Vec<String> = run_processors(&processors, vec![case])
            .into_iter()
            .map(|case| case.id)
            .collect();
        assert_eq!(ids, vec!["renamed-a_b.js".to_string()]);
    }

    #[test]
    fn colliding_ids_are_both_emitted_in_order() {
        let case = TestCaseSpec::new("c", vec![], vec![file("a/b.js"), file("a_b.js")], vec![]);

        let processed = IsolationProcessor.process(vec![case]);
        let tests: Vec<&str> = processed
            .iter()
            .map(|case| case.tests[0].display_path())
            .collect();

        assert_eq!(processed[0].id, processed[1].id);
        assert_eq!(tests, vec!["a/b.js", "a_b.js"]);
    }
}
