//! `.cwproj` project file reader
//!
//! Only the MSBuild pieces the resolver needs are kept: identity properties
//! and the `ItemGroup` item lists. Everything else is ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::path::Path;
use tracing::trace;
use uuid::Uuid;

use super::error::ProjectError;

/// `<ProjectReference Include="..."><Project>{guid}</Project><Name>..</Name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub include: String,
    pub project: Option<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub guid: Option<Uuid>,
    pub assembly_name: Option<String>,
    pub output_name: Option<String>,
    pub model: Option<String>,
    pub output_type: Option<String>,
    /// `Compile` items, as written (backslash-separated, project-relative)
    pub compile: Vec<String>,
    pub file_drivers: Vec<String>,
    pub libraries: Vec<String>,
    pub project_references: Vec<ProjectReference>,
    pub none: Vec<String>,
}

impl ProjectFile {
    /// Assembly name, falling back to the output name
    pub fn display_name(&self) -> Option<&str> {
        self.assembly_name
            .as_deref()
            .or(self.output_name.as_deref())
    }
}

fn xml_error(path: &Path, reason: impl Into<String>) -> ProjectError {
    ProjectError::Xml {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn include_attribute(element: &BytesStart<'_>, path: &Path) -> Result<Option<String>, ProjectError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| xml_error(path, format!("Attribute error: {e}")))?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(b"Include") {
            let value = attr
                .unescape_value()
                .map_err(|e| xml_error(path, format!("Attribute value error: {e}")))?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

/// Element-stack driven reader state
#[derive(Default)]
struct ProjectFileReader {
    file: ProjectFile,
    elements: Vec<String>,
    reference: Option<ProjectReference>,
}

impl ProjectFileReader {
    fn parent(&self) -> Option<&str> {
        self.elements.iter().rev().nth(1).map(String::as_str)
    }

    fn start(&mut self, element: &BytesStart<'_>, path: &Path, empty: bool) -> Result<(), ProjectError> {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase();
        if self.elements.last().map(String::as_str) == Some("itemgroup") {
            let include = include_attribute(element, path)?.unwrap_or_default();
            match name.as_str() {
                "compile" => self.file.compile.push(include),
                "filedriver" => self.file.file_drivers.push(include),
                "library" => self.file.libraries.push(include),
                "none" => self.file.none.push(include),
                "projectreference" => {
                    let reference = ProjectReference {
                        include,
                        ..ProjectReference::default()
                    };
                    if empty {
                        self.file.project_references.push(reference);
                    } else {
                        self.reference = Some(reference);
                    }
                }
                other => trace!(element = other, "Ignoring project item"),
            }
        }
        if !empty {
            self.elements.push(name);
        }
        Ok(())
    }

    fn end(&mut self) {
        if self.elements.pop().as_deref() == Some("projectreference")
            && let Some(reference) = self.reference.take()
        {
            self.file.project_references.push(reference);
        }
    }

    fn text(&mut self, value: &str) {
        let Some(current) = self.elements.last().cloned() else {
            return;
        };
        let parent = self.parent().map(str::to_string);
        match (parent.as_deref(), current.as_str()) {
            (Some("propertygroup"), "projectguid") => {
                if self.file.guid.is_none() {
                    self.file.guid = Uuid::parse_str(value).ok();
                }
            }
            (Some("propertygroup"), "assemblyname") => set_once(&mut self.file.assembly_name, value),
            (Some("propertygroup"), "outputname") => set_once(&mut self.file.output_name, value),
            (Some("propertygroup"), "model") => set_once(&mut self.file.model, value),
            (Some("propertygroup"), "outputtype") => set_once(&mut self.file.output_type, value),
            (Some("projectreference"), "project") => {
                if let Some(reference) = self.reference.as_mut() {
                    reference.project = Uuid::parse_str(value).ok();
                }
            }
            (Some("projectreference"), "name") => {
                if let Some(reference) = self.reference.as_mut() {
                    reference.name = Some(value.to_string());
                }
            }
            _ => {}
        }
    }
}

/// Parse `.cwproj` XML; `path` is only used in errors
pub fn parse_project_file(content: &str, path: &Path) -> Result<ProjectFile, ProjectError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut state = ProjectFileReader::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => state.start(e, path, false)?,
            Ok(Event::Empty(ref e)) => state.start(e, path, true)?,
            Ok(Event::End(_)) => state.end(),
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| xml_error(path, format!("Text error: {e}")))?;
                state.text(value.trim());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(xml_error(
                    path,
                    format!("XML parse error at position {}: {e}", reader.error_position()),
                ));
            }
            _ => {}
        }
    }

    if !state.elements.is_empty() {
        return Err(xml_error(path, "Unexpected end of document"));
    }
    Ok(state.file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <ProjectGuid>{A1B2C3D4-0000-1111-2222-333344445555}</ProjectGuid>
    <OutputType>Exe</OutputType>
    <AssemblyName>Invoice</AssemblyName>
    <OutputName>Invoice</OutputName>
    <Model>Dll</Model>
  </PropertyGroup>
  <PropertyGroup Condition=" '$(Configuration)' == 'Release' ">
    <OutputName>ignored</OutputName>
  </PropertyGroup>
  <ItemGroup>
    <Compile Include="Invoice.clw" />
    <Compile Include="src\Invoice001.clw">
      <Generated>true</Generated>
    </Compile>
    <FileDriver Include="TOPSPEED" />
    <Library Include="ClaRUN.lib" />
    <None Include="Invoice.red" />
    <ProjectReference Include="..\Lib\Lib.cwproj">
      <Project>{0F0E0D0C-1111-2222-3333-444455556666}</Project>
      <Name>Lib</Name>
    </ProjectReference>
  </ItemGroup>
</Project>"#;

    #[test]
    fn test_parse_properties_and_items() {
        let project = parse_project_file(PROJECT, Path::new("Invoice.cwproj")).unwrap();

        assert_eq!(
            project.guid,
            Uuid::parse_str("A1B2C3D4-0000-1111-2222-333344445555").ok()
        );
        assert_eq!(project.display_name(), Some("Invoice"));
        assert_eq!(project.output_name.as_deref(), Some("Invoice"));
        assert_eq!(project.model.as_deref(), Some("Dll"));
        assert_eq!(project.output_type.as_deref(), Some("Exe"));
        assert_eq!(project.compile, vec!["Invoice.clw", r"src\Invoice001.clw"]);
        assert_eq!(project.file_drivers, vec!["TOPSPEED"]);
        assert_eq!(project.libraries, vec!["ClaRUN.lib"]);
        assert_eq!(project.none, vec!["Invoice.red"]);

        let reference = &project.project_references[0];
        assert_eq!(reference.include, r"..\Lib\Lib.cwproj");
        assert_eq!(reference.name.as_deref(), Some("Lib"));
        assert!(reference.project.is_some());
    }

    #[test]
    fn test_missing_properties_stay_empty() {
        let project = parse_project_file("<Project><ItemGroup/></Project>", Path::new("x")).unwrap();
        assert_eq!(project, ProjectFile::default());
        assert_eq!(project.display_name(), None);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_project_file("<Project><ItemGroup></Project>", Path::new("bad.cwproj"));
        assert!(matches!(result, Err(ProjectError::Xml { .. })));

        let truncated = parse_project_file("<Project><ItemGroup>", Path::new("cut.cwproj"));
        assert!(matches!(truncated, Err(ProjectError::Xml { .. })));
    }
}
