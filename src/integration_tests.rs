//! End-to-end tests: content tree -> wire XML -> mock translation -> tree

#[cfg(test)]
mod tests {
    use crate::config::TranscoderConfig;
    use crate::document::{ContentDocumentCodec, WireDocument};
    use crate::filter::FilterConfig;
    use crate::mt::{MockBackend, MockMode, translate_document};
    use crate::tree::Node;

    fn codec() -> ContentDocumentCodec {
        ContentDocumentCodec::new(TranscoderConfig::default().with_filter(FilterConfig {
            ignore: vec!["_edit_lock".to_string()],
            copy_by_name: vec!["guid".to_string()],
            copy_by_regex: vec!["^[0-9]+$".to_string()],
            ..Default::default()
        }))
    }

    async fn translate(codec: &ContentDocumentCodec, tree: &Node, mode: MockMode) -> Node {
        let xml = codec.encode_to_xml(tree).unwrap();
        let document = WireDocument::from_xml(&xml).unwrap();

        let backend = MockBackend::new(mode);
        let translated = translate_document(&document, &backend, "en", "fr")
            .await
            .unwrap();

        codec.decode_from_xml(&translated.to_xml().unwrap()).unwrap()
    }

    // ============================================================================
    // Plain fields
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_plain_post() {
        let original = Node::from_json_str(
            r#"{
                "entity": {
                    "post_title": "Hello",
                    "post_content": "<p>Body</p>",
                    "menu_order": 0,
                    "guid": "http://example.com/?p=1"
                },
                "meta": {
                    "_edit_lock": "1450:1",
                    "subtitle": ["Small"],
                    "views": "15"
                }
            }"#,
        )
        .unwrap();

        let decoded = translate(&codec(), &original, MockMode::Suffix).await;
        let expected = Node::from_json_str(
            r#"{
                "entity": {
                    "post_title": "Hello_fr",
                    "post_content": "<p>Body</p>_fr",
                    "menu_order": 0,
                    "guid": "http://example.com/?p=1"
                },
                "meta": {
                    "subtitle": "Small_fr",
                    "views": "15"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(decoded, expected);
    }

    #[tokio::test]
    async fn test_e2e_identity_translation() {
        let original = Node::from_json_str(
            r#"{"entity":{"post_title":"Fish & Chips","tags":["a","b"],"empty":{}},"meta":{}}"#,
        )
        .unwrap();

        let decoded = translate(&codec(), &original, MockMode::NoOp).await;
        assert_eq!(decoded, original);
    }

    // ============================================================================
    // Block content
    // ============================================================================

    #[tokio::test]
    async fn test_e2e_block_post() {
        let content = concat!(
            r#"<!-- wp:core/heading {"level":2,"content":"Title"} --><h2>Title</h2><!-- /wp:core/heading -->"#,
            "\n",
            "<!-- wp:core/paragraph -->Hello<!-- /wp:core/paragraph -->",
            "\n",
            "<!-- wp:core/separator /-->"
        );
        let mut entity = crate::tree::Mapping::new();
        entity.insert("post_content".to_string(), Node::text(content));
        let mut root = crate::tree::Mapping::new();
        root.insert("entity".to_string(), Node::from(entity));
        let original = Node::from(root);

        let decoded = translate(&codec(), &original, MockMode::Suffix).await;
        let expected = concat!(
            r#"<!-- wp:core/heading {"level":2,"content":"Title_fr"} --><h2>Title</h2>_fr<!-- /wp:core/heading -->"#,
            "\n",
            "<!-- wp:core/paragraph -->Hello_fr<!-- /wp:core/paragraph -->",
            "\n",
            "<!-- wp:core/separator /-->"
        );
        assert_eq!(
            decoded.get("entity").unwrap().get("post_content"),
            Some(&Node::text(expected))
        );
    }

    #[tokio::test]
    async fn test_e2e_block_identity() {
        let content = concat!(
            r#"<!-- wp:core/columns --><!-- wp:core/column {"width":"50%"} -->"#,
            "<p>Left</p>",
            "<!-- /wp:core/column --><!-- /wp:core/columns -->"
        );
        let mut root = crate::tree::Mapping::new();
        root.insert("content".to_string(), Node::text(content));
        let original = Node::from(root);

        let decoded = translate(&codec(), &original, MockMode::NoOp).await;
        assert_eq!(decoded, original);
    }
}
