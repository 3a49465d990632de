//! Tests for TreeBuilder

use rstest::{fixture, rstest};

use clustree::domain::{
    AggregateRequest, Aggregation, ClusterGraph, ColumnSelection, ConfigurationError, DataError,
    DomainError, EdgeFilter, Label, MissingValues, Table, TreeBuilder, TreeOptions, Value,
};
use clustree::util::testing;

fn table(columns: &[(&str, &[&str])]) -> Table {
    let missing = MissingValues::default();
    Table::from_columns(
        columns
            .iter()
            .map(|(name, cells)| (*name, missing.cells(cells))),
    )
    .expect("valid table")
}

fn build(table: &Table, options: TreeOptions) -> ClusterGraph {
    TreeBuilder::new(options).build(table).expect("graph")
}

fn by_prefix(prefix: &str) -> TreeOptions {
    TreeOptions::new(ColumnSelection::by_prefix(prefix))
}

#[fixture]
fn even_split() -> Table {
    testing::init_test_setup();
    table(&[
        ("K1", &["1", "1", "1", "1", "1", "1"]),
        ("K2", &["1", "1", "1", "2", "2", "2"]),
    ])
}

#[rstest]
fn given_even_split_when_building_then_two_full_edges(even_split: Table) {
    // Act
    let graph = build(&even_split, by_prefix("K"));

    // Assert
    let sizes: Vec<(usize, usize)> = graph.nodes.iter().map(|n| (n.resolution, n.size)).collect();
    assert_eq!(sizes, vec![(0, 6), (1, 3), (1, 3)]);
    assert_eq!(graph.edges.len(), 2);
    for edge in &graph.edges {
        assert_eq!(edge.count, 3);
        assert_eq!(edge.in_proportion, 1.0);
        assert!(edge.is_core);
    }
}

#[test]
fn given_unequal_split_when_building_then_counts_follow_sizes() {
    // Arrange
    let table = table(&[
        ("K1", &["1", "1", "1", "1", "1", "1"]),
        ("K2", &["1", "1", "1", "1", "2", "2"]),
    ]);

    // Act
    let graph = build(&table, by_prefix("K"));

    // Assert
    let stats: Vec<(usize, f64)> = graph
        .edges
        .iter()
        .map(|e| (e.count, e.in_proportion))
        .collect();
    assert_eq!(stats, vec![(4, 1.0), (2, 1.0)]);
}

#[test]
fn given_missing_label_when_building_then_sample_is_excluded() {
    // Arrange
    let table = table(&[
        ("K1", &["1", "1", "1", "1", "1", "1"]),
        ("K2", &["1", "1", "NA", "2", "2", "2"]),
    ]);

    // Act
    let graph = build(&table, by_prefix("K"));

    // Assert
    let total: usize = graph.edges.iter().map(|e| e.count).sum();
    assert_eq!(total, 5);
    let k2c1 = graph.find_by_name("K2C1").expect("K2C1");
    assert_eq!(graph.nodes[k2c1].size, 2);
}

#[test]
fn given_merging_clusters_when_building_then_core_edge_has_highest_proportion() {
    // Arrange: K3C1 draws 2 samples from K2C1 and 1 from K2C2
    let table = table(&[
        ("K2", &["1", "1", "2", "2"]),
        ("K3", &["1", "1", "1", "2"]),
    ]);

    // Act
    let graph = build(&table, by_prefix("K"));

    // Assert
    let k3c1 = graph.find_by_name("K3C1").expect("K3C1");
    let incoming: Vec<(usize, f64, bool)> = graph
        .incoming(k3c1)
        .map(|e| (e.count, e.in_proportion, e.is_core))
        .collect();
    assert_eq!(incoming.len(), 2);
    assert!(incoming.contains(&(2, 2.0 / 3.0, true)));
    assert!(incoming.contains(&(1, 1.0 / 3.0, false)));
    assert_eq!(graph.core_parent(k3c1), graph.find_by_name("K2C1"));
}

#[test]
fn given_tied_sources_when_building_then_first_source_is_core() {
    // Arrange
    let table = table(&[("K1", &["1", "2"]), ("K2", &["1", "1"])]);

    // Act
    let graph = build(&table, by_prefix("K"));

    // Assert
    let target = graph.find_by_name("K2C1").expect("K2C1");
    assert_eq!(graph.core_parent(target), graph.find_by_name("K1C1"));
    assert_eq!(graph.edges.iter().filter(|e| e.is_core).count(), 1);
}

#[test]
fn given_numeric_resolution_names_when_selecting_then_sorted_numerically() {
    // Arrange: table order is 10 before 2
    let table = table(&[
        ("res.10", &["1", "2", "3"]),
        ("res.2", &["1", "1", "2"]),
        ("other", &["a", "b", "c"]),
    ]);

    // Act
    let graph = build(&table, by_prefix("res."));

    // Assert
    let names: Vec<&str> = graph.resolutions.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["2", "10"]);
    assert_eq!(graph.nodes[0].name, "res.2C1");
}

#[test]
fn given_explicit_columns_when_building_then_order_is_kept() {
    // Arrange
    let table = table(&[("a", &["1", "1", "2"]), ("b", &["1", "1", "1"])]);

    // Act
    let graph = build(&table, TreeOptions::new(ColumnSelection::by_columns(["b", "a"])));

    // Assert
    assert_eq!(graph.resolutions[0].column, "b");
    assert_eq!(graph.nodes.len(), 3);
}

#[rstest]
#[case::single_column(ColumnSelection::by_columns(["K1"]), ConfigurationError::TooFewResolutions { found: 1 })]
#[case::unknown_column(ColumnSelection::by_columns(["K1", "K9"]), ConfigurationError::ColumnNotFound("K9".into()))]
#[case::duplicate(ColumnSelection::by_columns(["K1", "K1"]), ConfigurationError::DuplicateColumn("K1".into()))]
#[case::no_match(ColumnSelection::by_prefix("res."), ConfigurationError::NoMatchingColumns { prefix: "res.".into() })]
#[case::nothing_selected(ColumnSelection::default(), ConfigurationError::EmptySelection)]
fn given_bad_selection_when_building_then_configuration_error(
    even_split: Table,
    #[case] selection: ColumnSelection,
    #[case] expected: ConfigurationError,
) {
    let result = TreeBuilder::new(TreeOptions::new(selection)).build(&even_split);

    assert_eq!(result, Err(DomainError::Configuration(expected)));
}

#[rstest]
fn given_missing_attribute_when_aggregating_then_column_not_found(even_split: Table) {
    let options = by_prefix("K").with_aggregation(AggregateRequest::new("age", Aggregation::Mean));

    let result = TreeBuilder::new(options).build(&even_split);

    assert_eq!(
        result,
        Err(DomainError::Configuration(ConfigurationError::ColumnNotFound(
            "age".into()
        )))
    );
}

#[test]
fn given_text_attribute_when_mean_requested_then_non_numeric_error() {
    let table = table(&[
        ("K1", &["1", "1"]),
        ("K2", &["1", "2"]),
        ("tissue", &["lung", "liver"]),
    ]);
    let options =
        by_prefix("K").with_aggregation(AggregateRequest::new("tissue", Aggregation::Mean));

    let err = TreeBuilder::new(options).build(&table).expect_err("type error");

    assert!(err.is_configuration());
}

#[test]
fn given_empty_table_when_building_then_data_error() {
    let table = table(&[("K1", &[]), ("K2", &[])]);

    let result = TreeBuilder::new(by_prefix("K")).build(&table);

    assert_eq!(result, Err(DomainError::Data(DataError::EmptyTable)));
}

#[test]
fn given_fractional_labels_when_building_then_non_discrete_error() {
    let table = table(&[("K1", &["1", "1"]), ("K2", &["0.5", "1.5"])]);

    let err = TreeBuilder::new(by_prefix("K"))
        .build(&table)
        .expect_err("fractional labels");

    assert!(err.is_data());
}

#[test]
fn given_attributes_when_aggregating_then_nodes_carry_values() {
    // Arrange
    let table = table(&[
        ("K1", &["1", "1", "1", "1"]),
        ("K2", &["1", "1", "2", "2"]),
        ("age", &["10", "20", "30", "NA"]),
        ("tissue", &["lung", "lung", "liver", "lung"]),
    ]);
    let options = by_prefix("K")
        .with_aggregation(AggregateRequest::new("age", Aggregation::Mean))
        .with_aggregation(AggregateRequest::new("tissue", Aggregation::Mode));

    // Act
    let graph = build(&table, options);

    // Assert
    let root = &graph.nodes[graph.find_by_name("K1C1").expect("K1C1")];
    assert_eq!(root.aggregates["mean_age"], Some(Value::Number(20.0)));
    assert_eq!(root.aggregates["mode_tissue"], Some(Value::Text("lung".into())));
    let k2c2 = &graph.nodes[graph.find_by_name("K2C2").expect("K2C2")];
    assert_eq!(k2c2.aggregates["mean_age"], Some(Value::Number(30.0)));
}

#[test]
fn given_reversed_rows_when_aggregating_fractions_then_same_values() {
    // Arrange
    let forward = table(&[
        ("K1", &["1", "1", "1"]),
        ("K2", &["1", "1", "1"]),
        ("age", &["0.1", "0.2", "0.3"]),
    ]);
    let backward = table(&[
        ("K1", &["1", "1", "1"]),
        ("K2", &["1", "1", "1"]),
        ("age", &["0.3", "0.2", "0.1"]),
    ]);
    let options = || {
        by_prefix("K")
            .with_aggregation(AggregateRequest::new("age", Aggregation::Mean))
            .with_aggregation(AggregateRequest::new("age", Aggregation::Sum))
    };

    // Act
    let first = build(&forward, options());
    let second = build(&backward, options());

    // Assert
    for (a, b) in first.nodes.iter().zip(&second.nodes) {
        assert_eq!(a.aggregates["mean_age"], b.aggregates["mean_age"]);
        assert_eq!(a.aggregates["sum_age"], b.aggregates["sum_age"]);
    }
}

#[rstest]
fn given_edge_filter_when_building_then_weak_edges_dropped() {
    // Arrange
    let table = table(&[
        ("K2", &["1", "1", "1", "2"]),
        ("K3", &["1", "1", "1", "1"]),
    ]);
    let options = by_prefix("K").with_filter(EdgeFilter {
        min_count: 2,
        min_proportion: 0.0,
    });

    // Act
    let graph = build(&table, options);

    // Assert
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].count, 3);
    assert_eq!(graph.nodes.len(), 3);
}

#[rstest]
fn given_out_of_range_proportion_filter_when_building_then_invalid_parameter(even_split: Table) {
    let options = by_prefix("K").with_filter(EdgeFilter {
        min_count: 0,
        min_proportion: 1.5,
    });

    let err = TreeBuilder::new(options).build(&even_split).expect_err("invalid");

    assert!(matches!(
        err,
        DomainError::Configuration(ConfigurationError::InvalidParameter { .. })
    ));
}

#[rstest]
fn given_same_input_when_building_twice_then_identical_graphs(even_split: Table) {
    let builder = TreeBuilder::new(by_prefix("K"));

    assert_eq!(builder.build(&even_split), builder.build(&even_split));
}

#[test]
fn given_text_labels_when_building_then_first_seen_order() {
    let table = table(&[("K1", &["b", "a", "b"]), ("K2", &["x", "x", "y"])]);

    let graph = build(&table, by_prefix("K"));

    let labels: Vec<&Label> = graph.nodes_at(0).map(|(_, n)| &n.cluster).collect();
    assert_eq!(labels, vec![&Label::Text("b".into()), &Label::Text("a".into())]);
}
