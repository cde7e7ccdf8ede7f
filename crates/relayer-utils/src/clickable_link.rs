// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use ethers::types::H256;
use url::Url;

/// A terminal hyperlink (OSC 8). Terminals that do not support it show the text only.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ClickableLink<'a> {
    text: &'a str,
    url: &'a str,
}

impl<'a> ClickableLink<'a> {
    pub fn new(text: &'a str, url: &'a str) -> Self {
        Self { text, url }
    }
}

impl fmt::Display for ClickableLink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\u{1b}]8;;{}\u{1b}\\{}\u{1b}]8;;\u{1b}\\",
            self.url, self.text
        )
    }
}

/// Builds `<explorer>/tx/<hash>`, or `None` when no explorer is configured.
pub fn tx_explorer_url(explorer: Option<&Url>, tx_hash: H256) -> Option<Url> {
    explorer.and_then(|base| base.join(&format!("tx/{tx_hash:#x}")).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_text_in_osc8_escape() {
        let link = ClickableLink::new("tx", "https://explorer.example/tx/0x01");
        assert_eq!(
            link.to_string(),
            "\u{1b}]8;;https://explorer.example/tx/0x01\u{1b}\\tx\u{1b}]8;;\u{1b}\\"
        );
    }

    #[test]
    fn explorer_url_appends_tx_path() {
        let explorer = Url::parse("https://explorer.example/").unwrap();
        let url = tx_explorer_url(Some(&explorer), H256::repeat_byte(0x01))
            .unwrap();
        assert_eq!(
            url.as_str(),
            format!("https://explorer.example/tx/{:#x}", H256::repeat_byte(0x01))
        );
        assert!(tx_explorer_url(None, H256::zero()).is_none());
    }
}
