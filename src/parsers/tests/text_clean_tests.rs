use crate::parsers::text::{self, EMAIL_TOKEN, URL_TOKEN};

#[cfg(test)]
mod basic_tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(text::clean(""), "");
        assert_eq!(text::clean("   \n   \t   \r\n   "), "");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(
            text::clean("  Line 1  \n\n  Line 2  \t\r\n  Line 3  "),
            "Line 1 Line 2 Line 3"
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(text::clean("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(text::clean("caf&eacute;&nbsp;au&#32;lait"), "café au lait");
        // Double-escaped markup is decoded and then stripped
        assert_eq!(text::clean("a &amp;lt;b&amp;gt; c"), "a c");
    }

    #[test]
    fn test_unknown_entities_are_kept() {
        assert_eq!(text::clean("&notanentity; &amp;"), "&notanentity; &");
    }

    #[test]
    fn test_control_characters_are_removed() {
        assert_eq!(text::clean("bell\u{7}here\u{0}there"), "bell here there");
    }

    #[test]
    fn test_markup_is_stripped() {
        let input = "<p>Hello <b>world</b></p><script>var x = '<b>';</script><style>p{}</style>!";
        assert_eq!(text::clean(input), "Hello world !");
    }

    #[test]
    fn test_urls_and_emails_are_masked() {
        let input = "Visit https://example.com/a?b=c or www.example.org, mail me@example.com";
        assert_eq!(
            text::clean(input),
            format!("Visit {} or {} mail {}", URL_TOKEN, URL_TOKEN, EMAIL_TOKEN)
        );
    }

    #[test]
    fn test_terminal_punctuation_is_collapsed() {
        assert_eq!(text::clean("Wow!!! Really??? Done... 好。。"), "Wow! Really? Done. 好。");
        // Mixed marks are left alone
        assert_eq!(text::clean("What?!"), "What?!");
    }
}

#[cfg(test)]
mod idempotence_tests {
    use super::*;

    const SAMPLES: [&str; 13] = [
        "",
        "plain text",
        "&amp;amp;lt;script&amp;gt;",
        "&am&#1;p;",
        "<<b>b>> and <> and < open",
        "http://a.com@b.c a@http://b.c x.www.y",
        "a@b.. c@.. !!?? ..!",
        "tabs\tand\nnewlines\r\nand\u{a0}nbsp",
        "&#60;style&#62;hidden&#60;/style&#62;shown",
        "mixed &unknown; &#x41;&#66; www..x",
        "a@b.c@d.e",
        "#/@6&#x3c;.gt;script@x.y",
        "x@y.z@w.v@u.t and [EMAIL]@q.r",
    ];

    #[test]
    fn test_clean_is_idempotent() {
        for sample in SAMPLES {
            let once = text::clean(sample);
            let twice = text::clean(&once);
            assert_eq!(once, twice, "clean is not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_chained_addresses_are_masked_whole() {
        assert_eq!(text::clean("a@b.c@d.e"), EMAIL_TOKEN);
        assert_eq!(
            text::clean("write a@b.c@d.e now"),
            format!("write {} now", EMAIL_TOKEN)
        );
    }

    #[test]
    fn test_clean_is_idempotent_on_generated_input() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        // Fragments that exercise every cleaning step and their interactions
        const PIECES: [&str; 24] = [
            "a", "x", "6", "@", ".", "..", "!", "?!", " ", "\t", "\u{1}", "&", ";", "#",
            "&#x3c;", "&lt;", "&amp;", "gt;", "<", ">", "script", "www.", "http://", "/",
        ];

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5000 {
            let len = rng.gen_range(1..12);
            let sample = (0..len)
                .map(|_| PIECES[rng.gen_range(0..PIECES.len())])
                .collect::<String>();

            let once = text::clean(&sample);
            assert_eq!(once, text::clean(&once), "clean is not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_steps_never_join_tokens() {
        // A control character between entity halves must not form a new entity
        assert_eq!(text::clean("&am\u{1}p;"), "&am p;");
    }
}
