use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Dataset, File, Group, H5Type, Location};
use ndarray::{concatenate, ArrayD, Axis};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::MergeError;
use super::file_name::TriggerFile;
use super::segments::Segment;

/// Anything that can merge an ordered list of files into one
pub trait MergeBackend {
    fn name(&self) -> String;

    /// Merge the inputs into output. With strict set, the inputs must cover a contiguous span.
    fn merge(&self, inputs: &[PathBuf], output: &Path, strict: bool) -> Result<(), MergeError>;
}

/// Check that the inputs, ordered by start time, abut with no gaps and no overlaps
pub fn check_contiguous(inputs: &[PathBuf]) -> Result<Segment, MergeError> {
    let mut segments = Vec::with_capacity(inputs.len());
    for path in inputs.iter() {
        match TriggerFile::from_path(path) {
            Some(file) => segments.push(file.segment),
            None => return Err(MergeError::UnnamedInput(path.clone())),
        }
    }
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    for pair in segments.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.start > a.end {
            return Err(MergeError::NotContiguous(a.end, b.start));
        } else if b.start < a.end {
            return Err(MergeError::Overlapping(b.start, a.end));
        }
    }
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => Ok(Segment::new(first.start, last.end)),
        _ => Err(MergeError::NoInputs),
    }
}

/// Call a generic function with the Rust type matching an HDF5 type descriptor
macro_rules! dispatch_type {
    ($descriptor:expr, $member:expr, $path:expr, $func:ident($($arg:expr),*)) => {
        match $descriptor {
            TypeDescriptor::Integer(IntSize::U1) => $func::<i8>($($arg),*),
            TypeDescriptor::Integer(IntSize::U2) => $func::<i16>($($arg),*),
            TypeDescriptor::Integer(IntSize::U4) => $func::<i32>($($arg),*),
            TypeDescriptor::Integer(IntSize::U8) => $func::<i64>($($arg),*),
            TypeDescriptor::Unsigned(IntSize::U1) => $func::<u8>($($arg),*),
            TypeDescriptor::Unsigned(IntSize::U2) => $func::<u16>($($arg),*),
            TypeDescriptor::Unsigned(IntSize::U4) => $func::<u32>($($arg),*),
            TypeDescriptor::Unsigned(IntSize::U8) => $func::<u64>($($arg),*),
            TypeDescriptor::Float(FloatSize::U4) => $func::<f32>($($arg),*),
            TypeDescriptor::Float(FloatSize::U8) => $func::<f64>($($arg),*),
            TypeDescriptor::Boolean => $func::<bool>($($arg),*),
            TypeDescriptor::VarLenAscii => $func::<VarLenAscii>($($arg),*),
            TypeDescriptor::VarLenUnicode => $func::<VarLenUnicode>($($arg),*),
            other => Err(MergeError::UnsupportedType(
                $member.to_string(),
                format!("{other:?}"),
                $path.to_path_buf(),
            )),
        }
    };
}

fn copy_attribute<T: H5Type + Clone>(
    attribute: &Attribute,
    target: &Location,
    name: &str,
) -> Result<(), MergeError> {
    let data = attribute.read_dyn::<T>()?;
    target.new_attr_builder().with_data(&data).create(name)?;
    Ok(())
}

/// Copy the attributes of every source onto the target. The first input holding a name wins.
fn copy_attributes(
    member: &str,
    sources: &[(&Path, &Location)],
    target: &Location,
) -> Result<(), MergeError> {
    let mut copied: Vec<String> = Vec::new();
    for (path, source) in sources.iter() {
        for name in source.attr_names()? {
            if copied.contains(&name) {
                continue;
            }
            let attribute = source.attr(&name)?;
            let descriptor = attribute.dtype()?.to_descriptor()?;
            let label = format!("{member}@{name}");
            dispatch_type!(
                &descriptor,
                label,
                path,
                copy_attribute(&attribute, target, &name)
            )?;
            copied.push(name);
        }
    }
    Ok(())
}

/// Concatenate one dataset from every input holding it along the first axis
fn concatenate_dataset<T: H5Type + Clone>(
    member: &str,
    sources: &[(&Path, Dataset)],
    target: &Group,
    name: &str,
) -> Result<Dataset, MergeError> {
    let mut merged: Option<ArrayD<T>> = None;
    for (path, dataset) in sources.iter() {
        let data = dataset.read_dyn::<T>()?;
        merged = Some(match merged.take() {
            None => data,
            Some(existing) => {
                if existing.ndim() == 0
                    || existing.ndim() != data.ndim()
                    || existing.shape()[1..] != data.shape()[1..]
                {
                    return Err(MergeError::ShapeMismatch(
                        member.to_string(),
                        path.to_path_buf(),
                    ));
                }
                concatenate(Axis(0), &[existing.view(), data.view()])?
            }
        });
    }
    match merged {
        Some(data) => Ok(target.new_dataset_builder().with_data(&data).create(name)?),
        None => Err(MergeError::NoInputs),
    }
}

fn merge_dataset(
    member: &str,
    name: &str,
    sources: &[(&Path, Dataset)],
    target: &Group,
) -> Result<(), MergeError> {
    let Some((first_path, first)) = sources.first() else {
        return Ok(());
    };
    let descriptor = first.dtype()?.to_descriptor()?;
    for (path, dataset) in sources.iter().skip(1) {
        if dataset.dtype()?.to_descriptor()? != descriptor {
            return Err(MergeError::TypeMismatch(
                member.to_string(),
                path.to_path_buf(),
            ));
        }
    }
    let merged = dispatch_type!(
        &descriptor,
        member,
        first_path,
        concatenate_dataset(member, sources, target, name)
    )?;

    let mut locations: Vec<(&Path, &Location)> = Vec::with_capacity(sources.len());
    for (path, dataset) in sources.iter() {
        let location: &Location = dataset;
        locations.push((*path, location));
    }
    copy_attributes(member, &locations, &merged)
}

/// Recursively merge the union of the members of the source groups into the target
fn merge_group(
    prefix: &str,
    sources: &[(&Path, Group)],
    target: &Group,
) -> Result<(), MergeError> {
    let mut locations: Vec<(&Path, &Location)> = Vec::with_capacity(sources.len());
    for (path, group) in sources.iter() {
        let location: &Location = group;
        locations.push((*path, location));
    }
    let target_location: &Location = target;
    let label = if prefix.is_empty() { "/" } else { prefix };
    copy_attributes(label, &locations, target_location)?;

    let mut names: Vec<String> = Vec::new();
    for (_, group) in sources.iter() {
        for name in group.member_names()? {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    for name in names.iter() {
        let member = format!("{prefix}/{name}");
        let mut groups = Vec::new();
        let mut datasets = Vec::new();
        for (path, group) in sources.iter() {
            if !group.link_exists(name) {
                continue;
            }
            if let Ok(subgroup) = group.group(name) {
                groups.push((*path, subgroup));
            } else if let Ok(dataset) = group.dataset(name) {
                datasets.push((*path, dataset));
            } else {
                return Err(MergeError::UnsupportedMember(member, path.to_path_buf()));
            }
        }

        if let (Some(_), Some((path, _))) = (groups.first(), datasets.first()) {
            return Err(MergeError::MemberConflict(member, path.to_path_buf()));
        } else if !groups.is_empty() {
            let subgroup = target.create_group(name)?;
            merge_group(&member, &groups, &subgroup)?;
        } else {
            merge_dataset(&member, name, &datasets, target)?;
        }
    }
    Ok(())
}

/// Merges HDF5 trigger files member by member.
///
/// Groups are walked recursively and every dataset is concatenated along its first axis in
/// its own type, so the output holds the union of the members of the inputs. Attributes of
/// groups and datasets are copied, the first input holding a name wins. A member that cannot
/// be merged fails the whole merge.
#[derive(Debug, Clone, Default)]
pub struct Hdf5Merge;

impl Hdf5Merge {
    fn write_merged(inputs: &[PathBuf], partial: &Path) -> Result<(), MergeError> {
        let mut files = Vec::with_capacity(inputs.len());
        for path in inputs.iter() {
            files.push((path.as_path(), File::open(path)?));
        }
        let mut roots = Vec::with_capacity(files.len());
        for (path, file) in files.iter() {
            roots.push((*path, file.group("/")?));
        }

        let output = File::create(partial)?;
        let root = output.group("/")?;
        merge_group("", &roots, &root)
    }
}

impl MergeBackend for Hdf5Merge {
    fn name(&self) -> String {
        String::from("hdf5")
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path, strict: bool) -> Result<(), MergeError> {
        if strict {
            check_contiguous(inputs)?;
        }
        // Write beside the output and rename, so an input is never clobbered mid-merge
        let partial = temporary_output(output);
        match Self::write_merged(inputs, &partial) {
            Ok(()) => {
                std::fs::rename(&partial, output)?;
                Ok(())
            }
            Err(e) => {
                if partial.exists() {
                    std::fs::remove_file(&partial)?;
                }
                Err(e)
            }
        }
    }
}

/// Merges by running an external program that writes `output` from `inputs`
#[derive(Debug, Clone)]
pub struct CommandMerge {
    program: String,
    output_flag: String,
}

impl CommandMerge {
    pub fn new(program: &str, output_flag: &str) -> Self {
        Self {
            program: program.to_string(),
            output_flag: output_flag.to_string(),
        }
    }

    /// ROOT files are merged with hadd
    pub fn root() -> Self {
        Self::new("hadd", "-f")
    }

    /// LIGO_LW XML files are merged with ligolw_add
    pub fn ligolw() -> Self {
        Self::new("ligolw_add", "--output")
    }
}

/// A hidden file next to the output that keeps its extension
fn temporary_output(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!(".partial-{name}"))
}

impl MergeBackend for CommandMerge {
    fn name(&self) -> String {
        self.program.clone()
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path, strict: bool) -> Result<(), MergeError> {
        if strict {
            check_contiguous(inputs)?;
        }
        // Write beside the output and rename, so an input is never clobbered mid-merge
        let partial = temporary_output(output);
        let mut command = Command::new(&self.program);
        command.arg(&self.output_flag).arg(&partial).args(inputs);
        log::debug!("Running {:?}", command);

        let status = command
            .status()
            .map_err(|e| MergeError::SpawnError(self.program.clone(), e))?;
        if !status.success() {
            if partial.exists() {
                std::fs::remove_file(&partial)?;
            }
            return Err(MergeError::CommandFailed(self.program.clone(), status));
        }
        std::fs::rename(&partial, output)?;
        Ok(())
    }
}

/// Pick the merge backend from the output file extension
pub fn backend_for(output: &Path) -> Box<dyn MergeBackend> {
    let name = output.to_string_lossy().to_lowercase();
    if name.ends_with(".root") {
        Box::new(CommandMerge::root())
    } else if name.ends_with(".xml") || name.ends_with(".xml.gz") {
        Box::new(CommandMerge::ligolw())
    } else {
        Box::new(Hdf5Merge)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub strict: bool,
    pub remove_input: bool,
}

/// What happened during a merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub output_size_bytes: u64,
    pub removed: Vec<PathBuf>,
}

fn is_same_file(a: &Path, b: &Path) -> Result<bool, MergeError> {
    Ok(std::fs::canonicalize(a)? == std::fs::canonicalize(b)?)
}

/// Merge the inputs into the output, then optionally remove the inputs.
///
/// A failed merge returns before anything is removed. The output is never removed, even when
/// it is also one of the inputs.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
    backend: &dyn MergeBackend,
) -> Result<MergeSummary, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::NoInputs);
    }
    let mut total_input_bytes: u64 = 0;
    for path in inputs.iter() {
        if !path.exists() {
            return Err(MergeError::BadFilePath(path.clone()));
        }
        total_input_bytes += path.metadata()?.len();
    }
    log::info!(
        "Merging {} files ({}) into {} with {}",
        inputs.len(),
        human_bytes::human_bytes(total_input_bytes as f64),
        output.to_string_lossy(),
        backend.name()
    );

    backend.merge(inputs, output, options.strict)?;

    let output_size_bytes = output.metadata()?.len();
    log::info!(
        "Wrote {} ({})",
        output.to_string_lossy(),
        human_bytes::human_bytes(output_size_bytes as f64)
    );

    let mut removed = Vec::new();
    if options.remove_input {
        for path in inputs.iter() {
            if is_same_file(path, output)? {
                continue;
            }
            std::fs::remove_file(path)?;
            log::info!("Removed {}", path.to_string_lossy());
            removed.push(path.clone());
        }
    }

    Ok(MergeSummary {
        output: output.to_path_buf(),
        output_size_bytes,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdf5::types::FixedAscii;
    use ndarray::{arr1, Array2};

    /// Backend that always fails without touching anything
    struct FailingMerge;

    impl MergeBackend for FailingMerge {
        fn name(&self) -> String {
            String::from("failing")
        }

        fn merge(&self, _: &[PathBuf], _: &Path, _: bool) -> Result<(), MergeError> {
            Err(MergeError::NoInputs)
        }
    }

    /// Backend that concatenates the raw bytes of the inputs
    struct ConcatMerge;

    impl MergeBackend for ConcatMerge {
        fn name(&self) -> String {
            String::from("concat")
        }

        fn merge(
            &self,
            inputs: &[PathBuf],
            output: &Path,
            strict: bool,
        ) -> Result<(), MergeError> {
            if strict {
                check_contiguous(inputs)?;
            }
            let mut bytes = Vec::new();
            for path in inputs {
                bytes.extend(std::fs::read(path)?);
            }
            std::fs::write(output, bytes)?;
            Ok(())
        }
    }

    fn make_inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_failed_merge_keeps_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = make_inputs(tmp.path(), &["L1-A-0-10.root", "L1-A-10-10.root"]);
        let options = MergeOptions {
            strict: false,
            remove_input: true,
        };
        let output = tmp.path().join("L1-A-0-20.root");
        let result = merge_files(&inputs, &output, &options, &FailingMerge);
        assert!(result.is_err());
        assert!(inputs.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_remove_inputs_but_not_output() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = make_inputs(tmp.path(), &["L1-A-0-10.txt", "L1-A-10-10.txt"]);
        let options = MergeOptions {
            strict: true,
            remove_input: true,
        };
        // Merge in place onto the first input
        let summary = merge_files(&inputs, &inputs[0], &options, &ConcatMerge).unwrap();
        assert_eq!(summary.removed, vec![inputs[1].clone()]);
        assert!(inputs[0].exists());
        assert!(!inputs[1].exists());
        assert_eq!(
            std::fs::read_to_string(&inputs[0]).unwrap(),
            "L1-A-0-10.txtL1-A-10-10.txt"
        );
    }

    #[test]
    fn test_missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = vec![tmp.path().join("nope.h5")];
        let output = tmp.path().join("out.h5");
        let options = MergeOptions::default();
        let result = merge_files(&inputs, &output, &options, &ConcatMerge);
        assert!(matches!(result, Err(MergeError::BadFilePath(_))));
        let result = merge_files(&[], &output, &options, &ConcatMerge);
        assert!(matches!(result, Err(MergeError::NoInputs)));
    }

    #[test]
    fn test_check_contiguous() {
        let ok = vec![PathBuf::from("L1-A-10-10.h5"), PathBuf::from("L1-A-0-10.h5")];
        assert_eq!(check_contiguous(&ok).unwrap(), Segment::new(0.0, 20.0));

        let gap = vec![PathBuf::from("L1-A-0-10.h5"), PathBuf::from("L1-A-15-10.h5")];
        assert!(matches!(check_contiguous(&gap), Err(MergeError::NotContiguous(_, _))));

        let overlap = vec![PathBuf::from("L1-A-0-10.h5"), PathBuf::from("L1-A-5-10.h5")];
        assert!(matches!(check_contiguous(&overlap), Err(MergeError::Overlapping(_, _))));

        let unnamed = vec![PathBuf::from("triggers.h5")];
        assert!(matches!(check_contiguous(&unnamed), Err(MergeError::UnnamedInput(_))));
    }

    #[test]
    fn test_backend_for() {
        assert_eq!(backend_for(Path::new("a.root")).name(), "hadd");
        assert_eq!(backend_for(Path::new("a.xml.gz")).name(), "ligolw_add");
        assert_eq!(backend_for(Path::new("a.h5")).name(), "hdf5");
    }

    #[test]
    fn test_hdf5_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = [(0.0, "L1-A-0-10.h5"), (10.0, "L1-A-10-10.h5")]
            .iter()
            .map(|(offset, name)| {
                let path = tmp.path().join(name);
                let file = File::create(&path).unwrap();
                let data = Array2::from_shape_vec((2, 2), vec![*offset, 1.0, *offset + 5.0, 2.0])
                    .unwrap();
                file.new_dataset_builder()
                    .with_data(&data)
                    .create("triggers")
                    .unwrap();
                path
            })
            .collect();
        let output = tmp.path().join("L1-A-0-20.h5");
        let options = MergeOptions {
            strict: true,
            remove_input: false,
        };
        merge_files(&inputs, &output, &options, &Hdf5Merge).unwrap();

        let merged = File::open(&output)
            .unwrap()
            .dataset("triggers")
            .unwrap()
            .read_2d::<f64>()
            .unwrap();
        assert_eq!(merged.shape(), &[4, 2]);
        assert_eq!(merged[[2, 0]], 10.0);
        assert!(inputs.iter().all(|p| p.exists()));
    }

    /// A trigger file with a root attribute, a group of typed datasets and a root counter
    fn write_nested(path: &Path, offset: f64) {
        let file = File::create(path).unwrap();
        file.new_attr_builder()
            .with_data(&arr1(&[3_i64]))
            .create("version")
            .unwrap();
        let group = file.create_group("triggers").unwrap();
        group
            .new_attr_builder()
            .with_data(&arr1(&[1_u8, 2]))
            .create("flags")
            .unwrap();
        group
            .new_dataset_builder()
            .with_data(&arr1(&[offset, offset + 1.0]))
            .create("time")
            .unwrap();
        let snr = group
            .new_dataset_builder()
            .with_data(&arr1(&[5.5_f32, 6.5]))
            .create("snr")
            .unwrap();
        snr.new_attr_builder()
            .with_data(&arr1(&[8_i32]))
            .create("threshold")
            .unwrap();
        file.new_dataset_builder()
            .with_data(&arr1(&[offset as i32]))
            .create("count")
            .unwrap();
    }

    fn read_time(path: &Path) -> Vec<f64> {
        File::open(path)
            .unwrap()
            .dataset("triggers/time")
            .unwrap()
            .read_1d::<f64>()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_hdf5_merge_keeps_groups_and_attributes() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = vec![
            tmp.path().join("L1-A-0-10.h5"),
            tmp.path().join("L1-A-10-10.h5"),
        ];
        write_nested(&inputs[0], 0.0);
        write_nested(&inputs[1], 10.0);
        let output = tmp.path().join("L1-A-0-20.h5");
        merge_files(&inputs, &output, &MergeOptions::default(), &Hdf5Merge).unwrap();

        assert_eq!(read_time(&output), vec![0.0, 1.0, 10.0, 11.0]);
        let file = File::open(&output).unwrap();
        let snr = file.dataset("triggers/snr").unwrap();
        assert_eq!(
            snr.dtype().unwrap().to_descriptor().unwrap(),
            TypeDescriptor::Float(FloatSize::U4)
        );
        assert_eq!(snr.read_1d::<f32>().unwrap().to_vec(), vec![5.5, 6.5, 5.5, 6.5]);
        let threshold = snr.attr("threshold").unwrap().read_1d::<i32>().unwrap();
        assert_eq!(threshold.to_vec(), vec![8]);
        let count = file.dataset("count").unwrap().read_1d::<i32>().unwrap();
        assert_eq!(count.to_vec(), vec![0, 10]);
        let version = file.attr("version").unwrap().read_1d::<i64>().unwrap();
        assert_eq!(version.to_vec(), vec![3]);
        let flags = file
            .group("triggers")
            .unwrap()
            .attr("flags")
            .unwrap()
            .read_1d::<u8>()
            .unwrap();
        assert_eq!(flags.to_vec(), vec![1, 2]);
        assert!(!tmp.path().join(".partial-L1-A-0-20.h5").exists());
    }

    #[test]
    fn test_hdf5_merge_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = vec![
            tmp.path().join("L1-A-0-10.h5"),
            tmp.path().join("L1-A-10-10.h5"),
        ];
        write_nested(&inputs[0], 0.0);
        write_nested(&inputs[1], 10.0);
        let options = MergeOptions {
            strict: true,
            remove_input: true,
        };
        let summary = merge_files(&inputs, &inputs[0], &options, &Hdf5Merge).unwrap();
        assert_eq!(summary.removed, vec![inputs[1].clone()]);
        assert_eq!(read_time(&inputs[0]), vec![0.0, 1.0, 10.0, 11.0]);
    }

    #[test]
    fn test_hdf5_unmergeable_member_leaves_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = vec![
            tmp.path().join("L1-A-0-10.h5"),
            tmp.path().join("L1-A-10-10.h5"),
        ];
        write_nested(&inputs[0], 0.0);
        write_nested(&inputs[1], 10.0);
        {
            let file = File::open_rw(&inputs[1]).unwrap();
            let labels = arr1(&[FixedAscii::<8>::from_ascii(b"glitch").unwrap()]);
            file.new_dataset_builder()
                .with_data(&labels)
                .create("labels")
                .unwrap();
        }
        let options = MergeOptions {
            strict: true,
            remove_input: true,
        };
        // Merging in place must not truncate the first input when the merge fails
        let result = merge_files(&inputs, &inputs[0], &options, &Hdf5Merge);
        assert!(matches!(
            result,
            Err(MergeError::UnsupportedType(member, _, _)) if member == "/labels"
        ));
        assert!(inputs.iter().all(|p| p.exists()));
        assert_eq!(read_time(&inputs[0]), vec![0.0, 1.0]);
        assert!(!tmp.path().join(".partial-L1-A-0-10.h5").exists());
    }

    #[test]
    fn test_hdf5_group_dataset_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = vec![
            tmp.path().join("L1-A-0-10.h5"),
            tmp.path().join("L1-A-10-10.h5"),
        ];
        write_nested(&inputs[0], 0.0);
        File::create(&inputs[1])
            .unwrap()
            .new_dataset_builder()
            .with_data(&arr1(&[1.0_f64]))
            .create("triggers")
            .unwrap();
        let output = tmp.path().join("L1-A-0-20.h5");
        let result = merge_files(&inputs, &output, &MergeOptions::default(), &Hdf5Merge);
        assert!(matches!(
            result,
            Err(MergeError::MemberConflict(member, path)) if member == "/triggers" && path == inputs[1]
        ));
        assert!(!output.exists());
    }
}
