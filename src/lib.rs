use hydrobricks_core::python::core_module;
use pyo3::prelude::*;
use pyo3::wrap_pymodule;

#[pymodule]
#[pyo3(name = "_hydrobricks")]
fn hydrobricks(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_wrapped(wrap_pymodule!(core_module))?;

    set_path(m, "hydrobricks._hydrobricks.core", "core")?;

    Ok(())
}

/// Make the submodule importable with `import hydrobricks._hydrobricks.core`.
fn set_path(m: &Bound<'_, PyModule>, path: &str, module: &str) -> PyResult<()> {
    let code = format!(
        "\
import sys
sys.modules['{path}'] = {module}
    "
    );
    m.py().run_bound(&code, None, Some(&m.dict()))
}
