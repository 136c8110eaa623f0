// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UFT multi-test batch output.

use super::{TestToRunData, TestsToRunConverter};
use crate::errors::ConvertError;
use quick_xml::{
    Writer,
    events::{BytesStart, Event},
};

/// Renders tests as a UFT multi-test batch (MTBX) document.
///
/// ```xml
/// <Mtbx>
///     <Test name="Login" path="C:\checkout\GUITests\Login">
///         <Parameter name="user" value="admin" type="string"/>
///     </Test>
/// </Mtbx>
/// ```
#[derive(Copy, Clone, Debug)]
pub struct MtbxConverter;

impl MtbxConverter {
    fn test_path(test: &TestToRunData, execution_directory: &str) -> String {
        let mut path = execution_directory.trim_end_matches('\\').to_owned();
        if !test.package_name.is_empty() {
            path.push('\\');
            path.push_str(&test.package_name);
        }
        path.push('\\');
        path.push_str(&test.test_name);
        path
    }
}

impl TestsToRunConverter for MtbxConverter {
    fn convert_tests(
        &self,
        tests: &[TestToRunData],
        execution_directory: &str,
    ) -> Result<String, ConvertError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .create_element("Mtbx")
            .write_inner_content(|writer| {
                for test in tests {
                    let path = Self::test_path(test, execution_directory);
                    let element = writer.create_element("Test").with_attributes([
                        ("name", test.test_name.as_str()),
                        ("path", path.as_str()),
                    ]);
                    if test.parameters.is_empty() {
                        element.write_empty()?;
                        continue;
                    }
                    element.write_inner_content(|writer| {
                        for (name, value) in &test.parameters {
                            writer.write_event(Event::Empty(
                                BytesStart::new("Parameter").with_attributes([
                                    ("name", name.as_str()),
                                    ("value", value.as_str()),
                                    ("type", "string"),
                                ]),
                            ))?;
                        }
                        Ok::<_, quick_xml::Error>(())
                    })?;
                }
                Ok::<_, quick_xml::Error>(())
            })
            .map_err(|err| ConvertError::MtbxWrite { err })?;

        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}
