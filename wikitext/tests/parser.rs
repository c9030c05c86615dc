use wikitext::node::{OrderedNode, ParamValue, TemplateInvocation};
use wikitext::section::{Content, Section};
use wikitext::{Document, parser::Parser};

fn parse(source: &str) -> Document {
    Parser::new(source.to_string(), 0).parse()
}

fn only_template(source: &str) -> TemplateInvocation {
    let doc = parse(source);
    match doc.nodes.as_slice() {
        [OrderedNode::Template(t)] => t.clone(),
        other => panic!("expected a single template, got {:?}", other),
    }
}

fn text(s: &str) -> OrderedNode {
    OrderedNode::Text(s.to_string())
}

/// All text in document order, with template boundaries removed.
fn text_of(nodes: &[OrderedNode]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|n| match n {
            OrderedNode::Text(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn text_of_content(content: &[Content]) -> Vec<String> {
    let mut out = Vec::new();
    for item in content {
        match item {
            Content::Text(s) => out.push(s.clone()),
            Content::Section(section) => out.extend(text_of_content(&section.content)),
            Content::Template(_) => {}
        }
    }
    out
}

#[test]
fn text_templates_and_headings_in_order() {
    let doc = parse("intro text\n{{Start}}\ninside\n== Part ==\nafter");
    assert_eq!(doc.nodes.len(), 5);
    assert_eq!(doc.nodes[0], text("intro text"));
    assert!(matches!(&doc.nodes[1], OrderedNode::Template(t) if t.name == "Start"));
    assert_eq!(doc.nodes[2], text("inside"));
    assert_eq!(
        doc.nodes[3],
        OrderedNode::SectionHeading {
            level: 2,
            title: "Part".to_string()
        }
    );
    assert_eq!(doc.nodes[4], text("after"));
    assert!(doc.warnings.is_empty());
}

#[test]
fn template_name_is_trimmed() {
    assert_eq!(only_template("{{  Foo \n}}").name, "Foo");
}

#[test]
fn positional_parameters_are_numbered_separately() {
    let t = only_template("{{Foo|a|k=v|b}}");
    let keys: Vec<&str> = t.params.keys().collect();
    assert_eq!(keys, vec!["1", "k", "2"]);
    assert_eq!(t.params.get("2"), Some(&ParamValue::from("b")));
}

#[test]
fn repeated_key_last_write_wins() {
    let t = only_template("{{Foo|x=1|y=0|x=2}}");
    assert_eq!(t.params.len(), 2);
    assert_eq!(t.params.get("x"), Some(&ParamValue::from("2")));
    let keys: Vec<&str> = t.params.keys().collect();
    assert_eq!(keys, vec!["x", "y"]);
}

#[test]
fn explicit_number_overrides_positional() {
    let t = only_template("{{Foo|first|1=second}}");
    assert_eq!(t.params.len(), 1);
    assert_eq!(t.params.get("1"), Some(&ParamValue::from("second")));
}

#[test]
fn plain_values_are_trimmed_text() {
    let t = only_template("{{Foo| spaced value \n|k =  v  }}");
    assert_eq!(t.params.get("1"), Some(&ParamValue::from("spaced value")));
    assert_eq!(t.params.get("k"), Some(&ParamValue::from("v")));
}

#[test]
fn lone_nested_invocation_collapses() {
    let t = only_template("{{Foo|p= {{Bar|x=1}} }}");
    let nested = t.params.get("p").and_then(|v| v.as_template()).expect("nested template");
    assert_eq!(nested.name, "Bar");
    assert_eq!(nested.params.get("x"), Some(&ParamValue::from("1")));
}

#[test]
fn mixed_content_becomes_node_list() {
    let t = only_template("{{Foo|p=see {{Bar|x=1}} above}}");
    let nodes = t.params.get("p").and_then(|v| v.as_nodes()).expect("node list");
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0], text("see"));
    assert!(matches!(&nodes[1], OrderedNode::Template(b) if b.name == "Bar"));
    assert_eq!(nodes[2], text("above"));
}

#[test]
fn two_invocations_become_node_list() {
    let t = only_template("{{Foo|p={{A}}{{B}}}}");
    let nodes = t.params.get("p").and_then(|v| v.as_nodes()).expect("node list");
    let names: Vec<&str> = nodes
        .iter()
        .filter_map(|n| match n {
            OrderedNode::Template(t) => Some(t.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn invocation_inside_comment_only_is_plain_text() {
    let t = only_template("{{Foo|p=<!-- {{Bar}} -->}}");
    assert_eq!(t.params.get("p"), Some(&ParamValue::from("<!-- {{Bar}} -->")));
}

#[test]
fn heading_like_value_without_templates_is_text() {
    let t = only_template("{{Foo|p== Head ==}}");
    assert_eq!(t.params.get("p"), Some(&ParamValue::from("= Head ==")));
}

#[test]
fn deeply_nested_values_resolve_recursively() {
    let t = only_template("{{A|{{B|{{C|leaf}}}}}}");
    let b = t.params.get("1").and_then(|v| v.as_template()).expect("B");
    let c = b.params.get("1").and_then(|v| v.as_template()).expect("C");
    assert_eq!(c.params.get("1"), Some(&ParamValue::from("leaf")));
}

#[test]
fn empty_name_yields_sentinel_and_warning() {
    let doc = parse("a {{ |k=v}} b");
    assert_eq!(doc.nodes.len(), 3);
    match &doc.nodes[1] {
        OrderedNode::Template(t) => {
            assert!(t.is_resolution_failure());
            assert!(t.params.is_empty());
        }
        other => panic!("expected sentinel, got {:?}", other),
    }
    assert_eq!(doc.warnings.len(), 1);
    assert!(doc.warnings[0].message.contains("invalid template name"));
    assert_eq!(doc.warnings[0].span, 2..11);
}

#[test]
fn bad_nested_value_falls_back_to_text() {
    let t = only_template("{{Foo|p={{ }}}}");
    assert_eq!(t.params.get("p"), Some(&ParamValue::from("{{ }}")));
}

#[test]
fn runaway_nesting_does_not_overflow() {
    let depth = 200;
    let source = format!("{}x{}", "{{A|".repeat(depth), "}}".repeat(depth));
    let doc = parse(&source);
    assert!(!doc.nodes.is_empty());
}

#[test]
fn unbalanced_openers_parse_quickly() {
    let source = "{{a".repeat(500);
    let started = std::time::Instant::now();
    let doc = parse(&source);
    assert_eq!(doc.nodes, vec![text(&source)]);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}

#[test]
fn comments_in_template_names_are_ignored() {
    let t = only_template("{{Foo<!-- c -->|a=1}}");
    assert_eq!(t.name, "Foo");
    assert_eq!(t.params.get("a"), Some(&ParamValue::from("1")));

    let t = only_template("{{Foo<!--\nnote\n-->}}");
    assert_eq!(t.name, "Foo");
}

#[test]
fn text_order_is_preserved_through_sections() {
    let doc = parse("zero\n== A ==\none {{T}} two\n=== B ===\nthree\n== C ==\nfour");
    let flat = text_of(&doc.nodes);
    assert_eq!(flat, vec!["zero", "one", "two", "three", "four"]);
    assert_eq!(text_of_content(&doc.sections()), flat);
    assert_eq!(text_of_content(&doc.flat()), flat);
}

#[test]
fn adjacent_sections_do_not_share_content() {
    let doc = parse("== Title ==\nbody\n== Title2 ==");
    assert_eq!(
        doc.sections(),
        vec![
            Content::Section(Section {
                level: 2,
                title: "Title".to_string(),
                content: vec![Content::Text("body".to_string())],
            }),
            Content::Section(Section {
                level: 2,
                title: "Title2".to_string(),
                content: vec![],
            }),
        ]
    );
}

#[test]
fn deeper_heading_is_a_sibling() {
    let doc = parse("lead\n== Outer ==\na\n=== Inner ===\nb");
    let sections = doc.sections();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0], Content::Text("lead".to_string()));
    match (&sections[1], &sections[2]) {
        (Content::Section(outer), Content::Section(inner)) => {
            assert_eq!((outer.level, outer.title.as_str()), (2, "Outer"));
            assert_eq!(outer.content, vec![Content::Text("a".to_string())]);
            assert_eq!((inner.level, inner.title.as_str()), (3, "Inner"));
            assert_eq!(inner.content, vec![Content::Text("b".to_string())]);
        }
        other => panic!("expected two sections, got {:?}", other),
    }
}

#[test]
fn flat_layout_keeps_headings_in_place() {
    let doc = parse("== A ==\nbody");
    let flat = doc.flat();
    assert_eq!(flat.len(), 2);
    assert!(matches!(&flat[0], Content::Section(s) if s.title == "A" && s.content.is_empty()));
    assert_eq!(flat[1], Content::Text("body".to_string()));
}

#[test]
fn json_shape_matches_node_kinds() {
    let doc = parse("hi\n{{Foo|a|k={{Bar}}}}\n== T ==");
    let json = serde_json::to_value(&doc.nodes).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!([
            {"type": "text", "content": "hi"},
            {"type": "template", "name": "Foo", "named_params": {
                "1": "a",
                "k": {"type": "template", "name": "Bar", "named_params": {}}
            }},
            {"type": "section", "level": 2, "title": "T"}
        ])
    );
}

#[test]
fn invocation_renders_back_to_call_syntax() {
    let t = only_template("{{Foo|a=1|b={{Bar|x=2}}}}");
    assert_eq!(t.to_string(), "{{ Foo | a=1 | b={{ Bar | x=2 }} }}");
    assert_eq!(only_template("{{Foo}}").to_string(), "{{ Foo }}");
}
