//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the index is INVALID.
//!
//! ## Tiers
//! - T0: Graph Integrity
//! - T1: Tree Integrity
//! - T2: Session Consistency
//! - T3: Round Trip

use session_core::{
    Attribute, Conditions, FromJson, Graph, Guid, Point, SequentialGuids, Session, SessionError,
    ToJson, TraversalOrder, TraversalStrategy, Tree, Vector,
};

fn session() -> Session {
    Session::with_generator("tiers", SequentialGuids::starting_at(0x100))
}

fn add_point(session: &mut Session, x: f64) -> Guid {
    let guid = session.next_guid();
    session
        .add_point(Point::new(guid, x, 0.0, 0.0))
        .expect("add point")
}

// =============================================================================
// TIER T0: GRAPH INTEGRITY
// =============================================================================

mod t0_graph_integrity {
    use super::*;

    /// T0.1: Two edges from one hub create three vertices and two edges.
    #[test]
    fn hub_with_two_spokes() {
        let mut graph = Graph::new("g", Guid::from_u128(1));
        graph.add_edge("A", "B", "x").expect("edge");
        graph.add_edge("A", "C", "y").expect("edge");

        assert_eq!(graph.number_of_vertices(), 3);
        assert_eq!(graph.number_of_edges(), 2);
        let mut neighbors: Vec<&str> = graph.neighbors("A").collect();
        neighbors.sort_unstable();
        assert_eq!(neighbors, vec!["B", "C"]);
    }

    /// T0.2: An edge exists in both directions or not at all.
    #[test]
    fn removal_is_symmetric() {
        let mut graph = Graph::new("g", Guid::from_u128(1));
        graph.add_edge("A", "B", "x").expect("edge");
        graph.remove_edge("B", "A");

        assert!(!graph.has_edge("A", "B"));
        assert!(!graph.has_edge("B", "A"));
        assert_eq!(graph.number_of_edges(), 0);
    }

    /// T0.3: Removing a vertex drops incident edges and keeps indices dense.
    #[test]
    fn vertex_removal_renumbers() {
        let mut graph = Graph::new("g", Guid::from_u128(1));
        for key in ["p", "q", "r", "s"] {
            graph.add_node(key, "");
        }
        graph.add_edge("q", "s", "").expect("edge");
        graph.remove_node("p").expect("remove");

        let indexed: Vec<(String, usize)> = graph
            .vertices()
            .map(|k| (k.to_string(), graph.node_index(k).expect("index")))
            .collect();
        assert_eq!(
            indexed,
            vec![
                ("q".to_string(), 0),
                ("r".to_string(), 1),
                ("s".to_string(), 2)
            ]
        );
        assert!(graph.has_edge("s", "q"));
    }

    /// T0.4: Structured attributes can be filtered, opaque ones cannot.
    #[test]
    fn attribute_filters() {
        let mut graph = Graph::new("g", Guid::from_u128(1));
        graph
            .add_edge("a", "b", Attribute::structured([("kind", "near")]))
            .expect("edge");
        graph.add_edge("b", "c", "kind=near").expect("edge");

        let near = Conditions::from([("kind".to_string(), "near".to_string())]);
        assert_eq!(graph.edges_where(&near).collect::<Vec<_>>(), vec![("a", "b")]);
    }

    /// T0.5: Self-loops are refused without side effects.
    #[test]
    fn self_loop_refused() {
        let mut graph = Graph::new("g", Guid::from_u128(1));
        assert!(matches!(
            graph.add_edge("a", "a", ""),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(!graph.has_node("a"));
    }
}

// =============================================================================
// TIER T1: TREE INTEGRITY
// =============================================================================

mod t1_tree_integrity {
    use super::*;

    /// T1.1: root -> (a -> (a1, a2), b) traverses in the documented orders.
    #[test]
    fn traversal_orders() {
        let mut tree = Tree::new("t", Guid::from_u128(2));
        let root = tree.create_node("root");
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        let a1 = tree.create_node("a1");
        let a2 = tree.create_node("a2");
        tree.add(root, None).expect("root");
        tree.add(a, Some(root)).expect("a");
        tree.add(b, Some(root)).expect("b");
        tree.add(a1, Some(a)).expect("a1");
        tree.add(a2, Some(a)).expect("a2");

        let names = |strategy: TraversalStrategy, order: TraversalOrder| -> Vec<String> {
            tree.traverse(strategy, order)
                .map(|n| n.name().to_string())
                .collect()
        };
        assert_eq!(
            names(TraversalStrategy::DepthFirst, TraversalOrder::PreOrder),
            ["root", "a", "a1", "a2", "b"]
        );
        assert_eq!(
            names(TraversalStrategy::DepthFirst, TraversalOrder::PostOrder),
            ["a1", "a2", "a", "b", "root"]
        );
        assert_eq!(
            names(TraversalStrategy::BreadthFirst, TraversalOrder::PreOrder),
            ["root", "a", "b", "a1", "a2"]
        );
    }

    /// T1.2: A second root is refused.
    #[test]
    fn single_root() {
        let mut tree = Tree::new("t", Guid::from_u128(2));
        let first = tree.create_node("first");
        let second = tree.create_node("second");
        tree.add(first, None).expect("root");

        assert!(matches!(
            tree.add(second, None),
            Err(SessionError::InvalidState(_))
        ));
        assert_eq!(tree.root().map(|r| r.name()), Some("first"));
    }

    /// T1.3: Unknown traversal names are invalid arguments.
    #[test]
    fn unknown_traversal_names() {
        assert!(matches!(
            "zigzag".parse::<TraversalStrategy>(),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            "levelorder".parse::<TraversalOrder>(),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    /// T1.4: Empty tree traverses to nothing and renders a placeholder.
    #[test]
    fn empty_tree() {
        let tree = Tree::new("t", Guid::from_u128(2));
        assert_eq!(tree.nodes().count(), 0);
        assert_eq!(tree.leaves().count(), 0);
        assert_eq!(tree.render_hierarchy(), "Empty tree");
    }
}

// =============================================================================
// TIER T2: SESSION CONSISTENCY
// =============================================================================

mod t2_session_consistency {
    use super::*;

    /// T2.1: Relationship then removal leaves the survivor without neighbours.
    #[test]
    fn relationship_removal_scenario() {
        let mut session = session();
        let g1 = add_point(&mut session, 1.0);
        let g2 = add_point(&mut session, 2.0);
        session.add_relationship(g1, g2, "near").expect("relate");

        assert_eq!(session.get_neighbours(g1), vec![g2.to_string()]);

        assert!(session.remove_object(g1));
        assert!(session.get_object(g1).is_none());
        assert!(session.get_object(g2).is_some());
        assert!(session.get_neighbours(g2).is_empty());
        session.validate().expect("consistent");
    }

    /// T2.2: New entities flatten under the first one.
    #[test]
    fn entities_flatten_under_root() {
        let mut session = session();
        let guids: Vec<Guid> = (0..4).map(|i| add_point(&mut session, f64::from(i))).collect();

        assert_eq!(
            session.tree().root().map(|r| r.name().to_string()),
            Some(guids[0].to_string())
        );
        assert_eq!(session.get_children(guids[0]), guids[1..].to_vec());
    }

    /// T2.3: Hierarchy moves are visible through get_children.
    #[test]
    fn hierarchy_move() {
        let mut session = session();
        let g1 = add_point(&mut session, 1.0);
        let g2 = add_point(&mut session, 2.0);
        let g3 = add_point(&mut session, 3.0);

        assert!(session.add_hierarchy(g2, g3).expect("move"));
        assert_eq!(session.get_children(g1), vec![g2]);
        assert_eq!(session.get_children(g2), vec![g3]);
        assert!(matches!(
            session.add_hierarchy(g3, g1),
            Err(SessionError::InvalidState(_))
        ));
    }

    /// T2.4: Duplicate GUIDs never produce a second lookup entry.
    #[test]
    fn duplicate_guid() {
        let mut session = session();
        let guid = session.next_guid();
        session
            .add_point(Point::new(guid, 0.0, 0.0, 0.0))
            .expect("first");
        assert!(
            session
                .add_vector(Vector::new(guid, 0.0, 0.0, 1.0))
                .is_err()
        );
        assert_eq!(session.len(), 1);
        assert_eq!(session.graph().number_of_vertices(), 1);
    }

    /// T2.5: Removing an unknown GUID is a soft failure.
    #[test]
    fn unknown_removal() {
        let mut session = session();
        add_point(&mut session, 1.0);
        assert!(!session.remove_object(Guid::from_u128(0xdead)));
        assert_eq!(session.len(), 1);
    }
}

// =============================================================================
// TIER T3: ROUND TRIP
// =============================================================================

mod t3_round_trip {
    use super::*;

    fn populated() -> Session {
        let mut session = session();
        let g1 = add_point(&mut session, 0.1);
        let g2 = add_point(&mut session, 1e-9);
        let gv = session.next_guid();
        session
            .add_vector(Vector::new(gv, 0.0, -1.0, 0.0).with_name("down"))
            .expect("vector");
        session.add_hierarchy(g2, gv).expect("move");
        session.add_relationship(g1, g2, "near").expect("relate");
        session.add_relationship(g2, gv, "default").expect("relate");
        session
    }

    /// T3.1: decode(encode(X)) encodes to the same document.
    #[test]
    fn json_idempotent() {
        let session = populated();
        let data = session.to_json_data();
        let restored = Session::from_json_data(&data).expect("decode");
        assert_eq!(restored.to_json_data(), data);
    }

    /// T3.2: Pretty and compact strings decode to the same session.
    #[test]
    fn string_forms_agree() {
        let session = populated();
        let pretty = session.to_json_string(true).expect("pretty");
        let compact = session.to_json_string(false).expect("compact");
        let a = Session::from_json_str(&pretty).expect("decode pretty");
        let b = Session::from_json_str(&compact).expect("decode compact");
        assert_eq!(a.to_json_data(), b.to_json_data());
    }

    /// T3.3: Binary snapshots are bit-exact across save -> load -> save.
    #[test]
    fn snapshot_bit_exact() {
        let session = populated();
        let bytes = session.to_bytes().expect("save");
        let restored = Session::from_bytes(&bytes).expect("load");
        assert_eq!(restored.to_bytes().expect("save again"), bytes);
        assert_eq!(restored.to_json_data(), session.to_json_data());
    }

    /// T3.4: Malformed documents fail instead of decoding partially.
    #[test]
    fn malformed_documents_fail() {
        let session = populated();
        let mut data = session.to_json_data();
        data["graph"]["edges"][0]["v0"] = serde_json::json!(7);
        assert!(matches!(
            Session::from_json_data(&data),
            Err(SessionError::TypeMismatch(_))
        ));

        let mut data = session.to_json_data();
        data["type"] = serde_json::json!("Graph");
        assert!(matches!(
            Session::from_json_data(&data),
            Err(SessionError::InvalidArgument(_))
        ));
    }
}
